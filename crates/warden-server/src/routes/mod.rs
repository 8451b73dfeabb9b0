// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP route handlers organized by concern.

pub mod auth;
pub mod health;
pub mod roles;
pub mod users;
