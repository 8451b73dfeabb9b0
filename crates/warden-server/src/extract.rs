// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request body extractors.

use axum::extract::FromRequest;

use crate::error::ServerError;

/// `Json<T>` whose rejections render as a 400 `validation_error` body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ServerError))]
pub struct ApiJson<T>(pub T);
