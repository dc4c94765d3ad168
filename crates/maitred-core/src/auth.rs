// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authorization context.
//!
//! Authorization is plain data passed explicitly into the operations that
//! need it. There is no ambient caller identity anywhere in the engine.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Requesting customer.
    User,
    /// Business staff; scoped by `business_id`.
    Merchant,
    /// Platform operator.
    Operator,
    /// Automated concierge acting on a user's behalf.
    Agent,
}

/// Who is performing an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthContext {
    pub actor_id: String,
    pub role: Role,
    /// Set for merchant principals; checked against listed dispatch targets.
    pub business_id: Option<String>,
}

impl AuthContext {
    pub fn user(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::User,
            business_id: None,
        }
    }

    pub fn merchant(actor_id: impl Into<String>, business_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::Merchant,
            business_id: Some(business_id.into()),
        }
    }

    pub fn operator(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::Operator,
            business_id: None,
        }
    }

    pub fn agent(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            role: Role::Agent,
            business_id: None,
        }
    }
}
