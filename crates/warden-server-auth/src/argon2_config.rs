// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Argon2 cost parameters for password hashing.
//!
//! Production defaults follow the argon2 crate (Argon2id, 19456 KiB,
//! 2 iterations, parallelism 1). [`HasherParams::insecure_fast`] exists for
//! tests and MUST NOT be used in production.
//!
//! Verification reads the parameters embedded in the stored PHC string, so
//! raising the cost does not invalidate existing hashes.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasherParams {
	pub memory_kib: u32,
	pub iterations: u32,
	pub parallelism: u32,
}

impl Default for HasherParams {
	fn default() -> Self {
		Self {
			memory_kib: Params::DEFAULT_M_COST,
			iterations: Params::DEFAULT_T_COST,
			parallelism: Params::DEFAULT_P_COST,
		}
	}
}

impl HasherParams {
	/// Minimal cost for test suites.
	pub fn insecure_fast() -> Self {
		Self {
			memory_kib: 1024,
			iterations: 1,
			parallelism: 1,
		}
	}

	/// Builds an Argon2id instance, rejecting out-of-range parameters.
	pub fn argon2(&self) -> Result<Argon2<'static>, argon2::Error> {
		let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None)?;
		Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
	}
}
