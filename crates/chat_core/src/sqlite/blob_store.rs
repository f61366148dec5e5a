use async_trait::async_trait;
use color_eyre::Result;

use super::{with_db, SharedDb};
use crate::blob::{BlobStore, PutOptions, StoredBlob};

/// SQLite の `blobs` テーブルを使う [`BlobStore`] 実装
#[derive(Clone)]
pub struct SqliteBlobStore {
	db: SharedDb,
}

impl SqliteBlobStore {
	pub fn new(db: SharedDb) -> Self {
		Self { db }
	}
}

#[async_trait]
impl BlobStore for SqliteBlobStore {
	async fn put(&self, key: &str, data: &[u8], options: &PutOptions) -> Result<()> {
		let key = key.to_string();
		let data = data.to_vec();
		let options = options.clone();
		with_db(&self.db, move |db| db.upsert_blob(&key, &data, &options.content_type, &options.cache_control)).await
	}

	async fn get(&self, key: &str) -> Result<Option<StoredBlob>> {
		let key = key.to_string();
		with_db(&self.db, move |db| db.read_blob(&key)).await
	}
}
