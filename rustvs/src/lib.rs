// src/lib.rs
pub mod error;

pub mod data {
    pub mod config;
    pub mod layout;
    pub mod container;
    pub mod raw;
    pub mod catalogue;
}

pub mod pipeline {
    pub mod channel;
    pub mod run;
}
