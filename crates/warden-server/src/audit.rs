// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit recording for request handlers.

use warden_server_auth::AuditLogEntry;

use crate::api::AppState;

/// Emits `entry` on the audit target and persists it.
///
/// A failed insert is logged and does not fail the request that caused it.
pub async fn record(state: &AppState, entry: AuditLogEntry) {
	entry.emit();
	if let Err(e) = state.audit_repo.insert_log(&entry).await {
		tracing::error!(
			error = %e,
			audit_id = %entry.id,
			event_type = %entry.event_type,
			"failed to persist audit entry"
		);
	}
}
