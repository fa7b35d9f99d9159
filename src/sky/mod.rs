//! Sky geometry: HEALPix indexing and great-circle separations.

pub mod healpix;
pub mod sphere;

pub use sphere::{offset_position, separation_arcsec, separation_deg};
