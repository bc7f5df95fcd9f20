// data module
pub mod data {
    pub mod cell;
    pub mod volume;
}

// algorithm module
pub mod algorithm {
    pub mod utility;
    pub mod validity;
    pub mod duplicates;
    pub mod ownership;
    pub mod baseline;
}

pub mod error;
pub mod executor;
