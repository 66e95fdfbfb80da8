// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Oblivious key-value store built by banded Gaussian elimination.
//!
//! `n` key-value pairs are packed into a table of `m` ring elements such that each
//! key's value is a fixed linear combination of `w` consecutive entries. The table
//! on its own does not reveal which keys were encoded.
//!
//! ```no_run
//! use okvs::{BatchDecoder, Encoder, Gf2, OkvsConfig, Params, Placement};
//! use rand::rngs::OsRng;
//!
//! # fn main() -> okvs::OkvsResult<()> {
//! let config = OkvsConfig::default();
//! let params = Params::with_slack(3, 16, 0.5)?;
//! let pairs = vec![(b"alice".to_vec(), 1u32), (b"bob".to_vec(), 2), (b"carol".to_vec(), 3)];
//!
//! let encoder = Encoder::new(params, Gf2::new(), &config)?;
//! let okvs = encoder.encode_with_retry(&pairs, Placement::Uniform, &mut OsRng)?;
//! assert_eq!(okvs.decode(b"bob"), 2);
//!
//! BatchDecoder::new(&config)?.verify(&okvs, &pairs)?;
//! # Ok(())
//! # }
//! ```

pub mod band;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod errors;
pub mod hashing;
pub mod math;
pub mod params;
pub mod ring;
pub mod scheduler;
pub mod system;
pub mod table;

pub use config::OkvsConfig;
pub use decoder::BatchDecoder;
pub use encoder::Encoder;
pub use errors::{MathError, OkvsError, OkvsResult};
pub use hashing::RowGenerator;
pub use params::{Keying, Params, Placement, Seed};
pub use ring::{Gf2, PrimeField, Ring, XorWord};
pub use scheduler::ParallelScheduler;
pub use table::Okvs;
