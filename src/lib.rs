#![no_std]

#[cfg(test)]
extern crate std;

pub mod address;

pub mod bitset;

pub mod config;

pub mod connector;

pub mod cubeslots;

pub mod entropy;

pub mod hwid;

pub mod neighbor;

pub mod packet;

pub mod pairing;

pub mod reconnect;

pub mod store;

pub mod task;

pub mod prelude;
