//! Immutable token bundles issued by the identity broker.

// self
use crate::{
	_prelude::*,
	auth::{SubjectId, TenantId, token::secret::TokenSecret},
};

/// Access token plus the metadata needed to call the compute API on behalf of a tenant.
///
/// Bundles are never mutated in place; a refresh produces a new bundle that replaces the
/// old one wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBundle {
	/// Bearer token; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Absolute expiry as Unix milliseconds.
	pub expiry_unix_ms: i64,
	/// Tenant (billing project) the token is scoped to.
	pub tenant_id: TenantId,
	/// Username the token was issued for.
	pub subject: SubjectId,
}
impl TokenBundle {
	/// Default window before expiry in which a bundle is already treated as stale.
	pub const DEFAULT_SKEW: Duration = Duration::seconds(60);

	/// Creates a bundle from its parts.
	pub fn new(
		access_token: impl Into<String>,
		expiry_unix_ms: i64,
		tenant_id: TenantId,
		subject: SubjectId,
	) -> Self {
		Self { access_token: TokenSecret::new(access_token), expiry_unix_ms, tenant_id, subject }
	}

	/// Decodes the credential document served by the identity broker.
	///
	/// The document does not name the subject, so the caller supplies it.
	pub fn from_broker_json(
		bytes: &[u8],
		subject: SubjectId,
	) -> Result<Self, serde_path_to_error::Error<serde_json::Error>> {
		let de = &mut serde_json::Deserializer::from_slice(bytes);
		let payload: BrokerCredentials = serde_path_to_error::deserialize(de)?;

		Ok(Self {
			access_token: payload.access_token,
			expiry_unix_ms: payload.access_token_expiry_date,
			tenant_id: payload.project_id,
			subject,
		})
	}

	/// Expiry as an [`OffsetDateTime`], saturating on out-of-range values.
	pub fn expires_at(&self) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp_nanos(i128::from(self.expiry_unix_ms) * 1_000_000)
			.unwrap_or(OffsetDateTime::UNIX_EPOCH)
	}

	/// Time left before expiry, measured from `now` (negative once expired).
	pub fn remaining_at(&self, now: OffsetDateTime) -> Duration {
		Duration::milliseconds(self.expiry_unix_ms.saturating_sub(unix_millis(now)))
	}

	/// Returns `true` when less than `skew` remains before expiry.
	///
	/// Exactly `skew` remaining still counts as fresh.
	pub fn is_stale_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		self.remaining_at(now) < skew
	}
}
impl Debug for TokenBundle {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenBundle")
			.field("access_token", &"<redacted>")
			.field("expiry_unix_ms", &self.expiry_unix_ms)
			.field("tenant_id", &self.tenant_id)
			.field("subject", &self.subject)
			.finish()
	}
}

#[derive(Deserialize)]
struct BrokerCredentials {
	access_token: TokenSecret,
	access_token_expiry_date: i64,
	project_id: TenantId,
}

/// Converts an instant to Unix milliseconds, saturating at the `i64` bounds.
pub(crate) fn unix_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(if millis.is_negative() { i64::MIN } else { i64::MAX })
}
