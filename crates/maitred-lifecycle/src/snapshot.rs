// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Price snapshot guard.
//!
//! A snapshot copies the listing price into the job at attach time and seals
//! it with a hash. Later writes may replace a snapshot only with an
//! identical one; any attempt to move the captured amount or currency is a
//! tamper rejection, not a merge.

use sha2::{Digest, Sha256};

use maitred_core::time::now_iso;
use maitred_core::{MaitredError, PriceSnapshot};

/// Hash over the length-framed snapshot fields. Amount uses big-endian
/// bytes so the preimage is byte-stable across platforms.
fn snapshot_hash(listing_id: &str, amount_minor: i64, currency: &str, captured_at: &str) -> String {
    let amount_bytes = amount_minor.to_be_bytes();
    let mut hasher = Sha256::new();
    for part in [
        listing_id.as_bytes(),
        &amount_bytes[..],
        currency.as_bytes(),
        captured_at.as_bytes(),
    ] {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

/// Capture a price into a sealed snapshot.
pub fn create_price_snapshot(
    listing_id: &str,
    amount_minor: i64,
    currency: &str,
) -> PriceSnapshot {
    let captured_at = now_iso();
    let hash = snapshot_hash(listing_id, amount_minor, currency, &captured_at);
    PriceSnapshot {
        listing_id: listing_id.to_string(),
        amount_minor,
        currency: currency.to_string(),
        captured_at,
        hash,
    }
}

/// Recompute the hash and compare. False means the stored record was altered
/// without replacing the whole snapshot.
pub fn verify_price_snapshot(snapshot: &PriceSnapshot) -> bool {
    snapshot.hash
        == snapshot_hash(
            &snapshot.listing_id,
            snapshot.amount_minor,
            &snapshot.currency,
            &snapshot.captured_at,
        )
}

/// Reject any update whose price fields differ from the captured snapshot.
pub fn validate_price_immutability(
    job_id: &str,
    existing: &PriceSnapshot,
    incoming_amount_minor: Option<i64>,
    incoming_currency: Option<&str>,
) -> Result<(), MaitredError> {
    if let Some(amount) = incoming_amount_minor {
        if amount != existing.amount_minor {
            return Err(MaitredError::PriceTamper {
                job_id: job_id.to_string(),
                detail: format!(
                    "amount_minor {} does not match captured {}",
                    amount, existing.amount_minor
                ),
            });
        }
    }
    if let Some(currency) = incoming_currency {
        if currency != existing.currency {
            return Err(MaitredError::PriceTamper {
                job_id: job_id.to_string(),
                detail: format!(
                    "currency {currency:?} does not match captured {:?}",
                    existing.currency
                ),
            });
        }
    }
    Ok(())
}
