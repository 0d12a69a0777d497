pub mod layout;
pub mod position_map;
pub mod resample;
