pub mod aggregate;
pub mod shred;
