//! Breadth-first, level-parallel enumeration of an asset folder tree.
//!
//! Each level lists every frontier folder concurrently and waits for all of them before
//! moving on. Folders discovered on one level form the next frontier. The first failing
//! listing aborts the walk and drops everything collected so far.

// crates.io
use futures::future;
// self
use crate::{
	_prelude::*,
	http::HttpTransport,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	rest::RestDispatcher,
};

/// Asset type reported by the listing endpoint; unknown values are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetKind {
	/// `FOLDER`
	Folder,
	/// `IMAGE`
	Image,
	/// `IMAGE_COLLECTION`
	ImageCollection,
	/// `TABLE`
	Table,
	/// `CLASSIFIER`
	Classifier,
	/// `FEATURE_VIEW`
	FeatureView,
	/// Any other type string.
	Other(String),
}
impl AssetKind {
	/// Wire representation.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Folder => "FOLDER",
			Self::Image => "IMAGE",
			Self::ImageCollection => "IMAGE_COLLECTION",
			Self::Table => "TABLE",
			Self::Classifier => "CLASSIFIER",
			Self::FeatureView => "FEATURE_VIEW",
			Self::Other(other) => other,
		}
	}

	/// Returns `true` for folders, the only kind that is descended into.
	pub fn is_folder(&self) -> bool {
		matches!(self, Self::Folder)
	}
}
impl From<String> for AssetKind {
	fn from(value: String) -> Self {
		match value.as_str() {
			"FOLDER" => Self::Folder,
			"IMAGE" => Self::Image,
			"IMAGE_COLLECTION" => Self::ImageCollection,
			"TABLE" => Self::Table,
			"CLASSIFIER" => Self::Classifier,
			"FEATURE_VIEW" => Self::FeatureView,
			_ => Self::Other(value),
		}
	}
}
impl From<AssetKind> for String {
	fn from(value: AssetKind) -> Self {
		match value {
			AssetKind::Other(other) => other,
			known => known.as_str().to_owned(),
		}
	}
}
impl Display for AssetKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One listed asset.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetEntry {
	/// Asset type.
	#[serde(rename = "type")]
	pub kind: AssetKind,
	/// Full resource name (`projects/<project>/assets/<path>`).
	pub name: String,
	/// Short asset id.
	pub id: String,
}

/// Walks an asset tree through a [`RestDispatcher`].
pub struct TreeEnumerator<C>
where
	C: ?Sized + HttpTransport,
{
	dispatcher: RestDispatcher<C>,
}
impl<C> TreeEnumerator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates an enumerator that lists through `dispatcher`.
	pub fn new(dispatcher: RestDispatcher<C>) -> Self {
		Self { dispatcher }
	}

	/// Dispatcher used for listings.
	pub fn dispatcher(&self) -> &RestDispatcher<C> {
		&self.dispatcher
	}

	/// Lists every asset reachable from `root`, in discovery order.
	///
	/// Sibling order within a level follows the frontier order, but callers should only rely
	/// on the set of entries.
	pub async fn enumerate(&self, root: &str) -> Result<Vec<AssetEntry>> {
		const KIND: FlowKind = FlowKind::Enumerate;

		let span = FlowSpan::new(KIND, "enumerate");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.walk(root)).await;

		obs::finish(KIND, result)
	}

	async fn walk(&self, root: &str) -> Result<Vec<AssetEntry>> {
		let mut visited = HashSet::from([root.to_owned()]);
		let mut frontier = vec![root.to_owned()];
		let mut entries = Vec::new();

		while !frontier.is_empty() {
			let levels =
				future::try_join_all(frontier.iter().map(|node| self.list_children(node))).await?;
			let mut next = Vec::new();

			for entry in levels.into_iter().flatten() {
				if entry.kind.is_folder() && visited.insert(entry.name.clone()) {
					next.push(entry.name.clone());
				}

				entries.push(entry);
			}

			frontier = next;
		}

		Ok(entries)
	}

	async fn list_children(&self, parent: &str) -> Result<Vec<AssetEntry>> {
		let mut children = Vec::new();
		let mut page_token = None::<String>;

		loop {
			let page = self.dispatcher.list_assets(parent, page_token.as_deref()).await?;

			children.extend(parse_children(&page));

			let next = page
				.get("nextPageToken")
				.and_then(Value::as_str)
				.filter(|token| !token.is_empty())
				.map(str::to_owned);

			if next.is_none() || next == page_token {
				return Ok(children);
			}

			page_token = next;
		}
	}
}
impl<C> Debug for TreeEnumerator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TreeEnumerator").field("dispatcher", &self.dispatcher).finish()
	}
}

/// Extracts well-formed children from one listing page; anything else counts as no children.
fn parse_children(page: &Value) -> Vec<AssetEntry> {
	let Some(assets) = page.get("assets").and_then(Value::as_array) else {
		if page.get("assets").is_some() {
			obs::note_skipped(FlowKind::Enumerate, "page", &"`assets` is not an array");
		}

		return Vec::new();
	};

	assets
		.iter()
		.filter_map(|asset| match AssetEntry::deserialize(asset) {
			Ok(entry) => Some(entry),
			Err(err) => {
				obs::note_skipped(FlowKind::Enumerate, "asset", &err);

				None
			},
		})
		.collect()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::{FAR_FUTURE_MS, ScriptedReply, ScriptedTransport, scripted_dispatcher};

	fn listing(children: &[(&str, &str)]) -> ScriptedReply {
		let assets = children
			.iter()
			.map(|(kind, name)| {
				serde_json::json!({
					"type": kind,
					"name": name,
					"id": name.rsplit('/').next().unwrap_or(name),
				})
			})
			.collect::<Vec<_>>();

		ScriptedReply::json(200, serde_json::json!({ "assets": assets }))
	}

	#[test]
	fn asset_kinds_keep_unknown_values() {
		let entry: AssetEntry = serde_json::from_value(
			serde_json::json!({ "type": "MODEL", "name": "projects/p/assets/m", "id": "m" }),
		)
		.expect("Unknown kinds should decode.");

		assert_eq!(entry.kind, AssetKind::Other("MODEL".into()));
		assert_eq!(
			serde_json::to_value(&entry).expect("Entry should serialize.")["type"],
			"MODEL"
		);
		assert_eq!(AssetKind::from("IMAGE_COLLECTION".to_owned()), AssetKind::ImageCollection);
	}

	#[test]
	fn malformed_pages_and_children_are_skipped() {
		assert!(parse_children(&serde_json::json!({})).is_empty());
		assert!(parse_children(&Value::Null).is_empty());
		assert!(parse_children(&serde_json::json!({ "assets": "nope" })).is_empty());

		let children = parse_children(&serde_json::json!({
			"assets": [
				{ "type": "TABLE", "name": "projects/p/assets/t", "id": "t" },
				{ "name": "projects/p/assets/missing-type", "id": "x" },
			]
		}));

		assert_eq!(children.len(), 1);
		assert_eq!(children[0].kind, AssetKind::Table);
	}

	#[tokio::test]
	async fn walks_levels_and_follows_page_tokens() {
		let transport = ScriptedTransport::new([
			ScriptedReply::json(
				200,
				serde_json::json!({
					"assets": [{ "type": "FOLDER", "name": "projects/p/assets/a", "id": "a" }],
					"nextPageToken": "page-2",
				}),
			),
			listing(&[("IMAGE", "projects/p/assets/img")]),
			listing(&[("TABLE", "projects/p/assets/a/t")]),
		]);
		let enumerator = TreeEnumerator::new(scripted_dispatcher(&transport, FAR_FUTURE_MS));
		let entries =
			enumerator.enumerate("projects/p/assets").await.expect("Enumeration should succeed.");
		let names = entries.iter().map(|entry| entry.name.as_str()).collect::<Vec<_>>();

		assert_eq!(
			names,
			["projects/p/assets/a", "projects/p/assets/img", "projects/p/assets/a/t"]
		);
		assert_eq!(transport.calls(), 3);
		assert!(transport.requests()[1].uri.ends_with(":listAssets?pageToken=page-2"));
	}

	#[tokio::test]
	async fn first_error_aborts_the_walk() {
		let transport = ScriptedTransport::new([
			listing(&[("FOLDER", "projects/p/assets/a"), ("FOLDER", "projects/p/assets/b")]),
			ScriptedReply::remote(403, "PERMISSION_DENIED"),
			listing(&[("IMAGE", "projects/p/assets/b/i")]),
		]);
		let err = TreeEnumerator::new(scripted_dispatcher(&transport, FAR_FUTURE_MS))
			.enumerate("projects/p/assets")
			.await
			.expect_err("A failing folder must abort the walk.");

		assert_eq!(err.remote_code(), Some(403));
	}

	#[tokio::test]
	async fn sibling_folders_are_listed_concurrently() {
		let transport = ScriptedTransport::new([
			listing(&[("FOLDER", "projects/p/assets/a"), ("FOLDER", "projects/p/assets/b")]),
			listing(&[("IMAGE", "projects/p/assets/a/1"), ("TABLE", "projects/p/assets/a/2")])
				.after(StdDuration::from_millis(50)),
			listing(&[("IMAGE", "projects/p/assets/b/1"), ("TABLE", "projects/p/assets/b/2")]),
		]);
		let entries = TreeEnumerator::new(scripted_dispatcher(&transport, FAR_FUTURE_MS))
			.enumerate("projects/p/assets")
			.await
			.expect("Enumeration should succeed.");
		let names = entries.iter().map(|entry| entry.name.as_str()).collect::<HashSet<_>>();

		assert_eq!(entries.len(), 6);
		assert_eq!(
			names,
			HashSet::from([
				"projects/p/assets/a",
				"projects/p/assets/b",
				"projects/p/assets/a/1",
				"projects/p/assets/a/2",
				"projects/p/assets/b/1",
				"projects/p/assets/b/2",
			])
		);
		assert_eq!(transport.calls(), 3);
		assert_eq!(transport.peak_in_flight(), 2);
	}
}
