//! Data types decoded from the Allocation API

pub mod allocation;
pub mod value;
