pub mod device;
pub mod record;
