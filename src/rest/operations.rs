//! Convenience calls for the compute API endpoints the crate relies on.

// crates.io
use url::form_urlencoded;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, DecodeError},
	http::HttpTransport,
	rest::{RestDispatcher, RestRequest},
};

/// Optional rendering parameters for [`RestDispatcher::create_map`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapOptions {
	/// Tile image format, e.g. `PNG` or `JPEG`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub file_format: Option<String>,
	/// Bands to render, in display order.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub band_ids: Vec<String>,
	/// Visualization parameters (ranges, palette, gamma).
	#[serde(skip_serializing_if = "Option::is_none")]
	pub visualization_options: Option<Value>,
}

/// Map created by [`RestDispatcher::create_map`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapId {
	/// Resource name, `projects/<project>/maps/<id>`.
	pub name: String,
	/// Tile URL with literal `{z}`, `{x}` and `{y}` placeholders.
	pub tile_url_format: String,
}

#[derive(Serialize)]
struct MapRequest<'a> {
	expression: &'a Value,
	#[serde(flatten)]
	options: &'a MapOptions,
}

impl<C> RestDispatcher<C>
where
	C: ?Sized + HttpTransport,
{
	/// Tiles are always served by the `v1` surface of the API host.
	pub const TILE_API_VERSION: &'static str = "v1";

	/// Fetches asset metadata by id (relative to the session's project).
	pub async fn get_asset(&self, asset_id: &str) -> Result<Value> {
		let asset_id = escape_braces(asset_id);
		let template = format!("{{api_base}}/projects/{{project}}/assets/{asset_id}");

		self.call(&RestRequest::get(template)).await
	}

	/// Evaluates a serialized expression and returns its `result` field.
	pub async fn compute_value(
		&self,
		expression: Value,
		workload_tag: Option<&str>,
	) -> Result<Value> {
		let body = serde_json::json!({ "expression": expression, "workloadTag": workload_tag });
		let mut payload = self
			.call(&RestRequest::post("{api_base}/projects/{project}/value:compute", body))
			.await?;

		payload
			.get_mut("result")
			.map(Value::take)
			.ok_or_else(|| DecodeError::MissingField { field: "result" }.into())
	}

	/// Lists one page of children under `parent` (a full asset name such as
	/// `projects/<project>/assets/<folder>`).
	pub async fn list_assets(&self, parent: &str, page_token: Option<&str>) -> Result<Value> {
		let parent = escape_braces(parent);
		let mut template = format!("{{api_base}}/{parent}/:listAssets");

		if let Some(token) = page_token {
			template.push_str("?pageToken=");
			template.extend(form_urlencoded::byte_serialize(token.as_bytes()));
		}

		self.call(&RestRequest::get(template)).await
	}

	/// Registers a map for a serialized image expression and returns its tile URL format.
	pub async fn create_map(&self, expression: &Value, options: &MapOptions) -> Result<MapId> {
		let body = serde_json::to_value(MapRequest { expression, options })
			.map_err(ConfigError::InvalidBody)?;
		let payload =
			self.call(&RestRequest::post("{api_base}/projects/{project}/maps", body)).await?;
		let name = payload
			.get("name")
			.and_then(Value::as_str)
			.ok_or(DecodeError::MissingField { field: "name" })?
			.to_owned();
		let tile_url_format = format!(
			"{}/{}/{name}/tiles/{{z}}/{{x}}/{{y}}",
			self.api.base.origin().ascii_serialization(),
			Self::TILE_API_VERSION,
		);

		Ok(MapId { name, tile_url_format })
	}
}

/// Keeps literal braces in asset names from being taken for template placeholders.
fn escape_braces(segment: &str) -> String {
	segment.replace('{', "%7B").replace('}', "%7D")
}
