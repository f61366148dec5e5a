//! SQLite ユーティリティモジュール
//!
//! `rusqlite` を使って、画像などのバイナリをキーで保存する簡易 blob ストアと、
//! プロンプト/応答の組を記録するメッセージログを1つの DB ファイル上に実装します。
//!
//! # 特色
//! - Windows でもビルドしやすいように `bundled` フィーチャを利用
//! - UPSERT (`INSERT .. ON CONFLICT`) によりリトライ時は同じキーを上書き
//! - content-type / cache-control をデータと一緒に保持
//! - 非同期側からは `spawn_blocking` 越しに呼ぶ (ロック待ちや書き込みでランタイムを止めない)
//!
//! # 代表的な使い方
//! ```no_run
//! use chat_core::sqlite::Db;
//!
//! # fn demo() -> color_eyre::Result<()> {
//! let mut db = Db::open_or_create("chat_worker.sqlite")?; // ファイルが無ければ作成
//! db.upsert_blob("image-1.png", &[0x89, 0x50], "image/png", "public, max-age=31536000")?;
//! let blob = db.read_blob("image-1.png")?;
//! assert!(blob.is_some());
//! db.record_message("203.0.113.7", "hello", "hi!")?;
//! # Ok(()) }
//! ```

mod blob_store;
mod message_log;

pub use blob_store::SqliteBlobStore;
pub use message_log::{LoggedMessage, MessageLog};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use color_eyre::eyre::{eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use crate::blob::StoredBlob;

/// 複数コンポーネントで共有する DB ハンドル
pub type SharedDb = Arc<Mutex<Db>>;

/// DB ハンドル。内部で `rusqlite::Connection` を保持します。
pub struct Db {
	conn: Connection,
	path: PathBuf,
}

impl Db {
	/// DB を開き、存在しなければ新規作成。
	pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
		let p = path.as_ref().to_path_buf();
		let conn = Connection::open(&p)?;
		let db = Self { conn, path: p };
		db.ensure_schema()?;
		Ok(db)
	}

	/// メモリ上 (永続化なし) の DB を作成 (主にテスト用途)
	pub fn in_memory() -> Result<Self> {
		let conn = Connection::open_in_memory()?;
		let db = Self { conn, path: PathBuf::from(":memory:") };
		db.ensure_schema()?;
		Ok(db)
	}

	/// `Arc<Mutex<_>>` に包んで共有可能にする
	pub fn into_shared(self) -> SharedDb {
		Arc::new(Mutex::new(self))
	}

	/// スキーマを作成 (存在しない場合のみ)
	fn ensure_schema(&self) -> Result<()> {
		self.conn.execute_batch(
			r#"
			CREATE TABLE IF NOT EXISTS blobs (
				key TEXT PRIMARY KEY,
				data BLOB NOT NULL,
				content_type TEXT NOT NULL,
				cache_control TEXT NOT NULL,
				size_bytes INTEGER NOT NULL,
				modified_at_epoch_ms INTEGER NOT NULL
			);
			CREATE TABLE IF NOT EXISTS Messages (
				id INTEGER PRIMARY KEY AUTOINCREMENT,
				IP TEXT NOT NULL,
				Prompt TEXT NOT NULL,
				Result TEXT NOT NULL,
				created_at INTEGER NOT NULL
			);
			CREATE INDEX IF NOT EXISTS idx_messages_created ON Messages(created_at DESC);
			"#,
		)?;
		Ok(())
	}

	/// 現在時刻 (ms since epoch)
	fn now_ms() -> Result<i64> {
		Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as i64)
	}

	/// バイト列をメタデータと一緒に保存 (key が既に存在すれば更新)
	pub fn upsert_blob(&mut self, key: &str, data: &[u8], content_type: &str, cache_control: &str) -> Result<()> {
		let modified = Self::now_ms()?;
		let size = data.len() as i64;
		self.conn.execute(
			r#"INSERT INTO blobs(key, data, content_type, cache_control, size_bytes, modified_at_epoch_ms)
			   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
			   ON CONFLICT(key) DO UPDATE SET
				   data = excluded.data,
				   content_type = excluded.content_type,
				   cache_control = excluded.cache_control,
				   size_bytes = excluded.size_bytes,
				   modified_at_epoch_ms = excluded.modified_at_epoch_ms"#,
			params![key, data, content_type, cache_control, size, modified],
		)?;
		debug!(target: "sqlite", "upsert key={} ({} bytes)", key, size);
		Ok(())
	}

	/// 読み出し。存在しなければ None
	pub fn read_blob(&self, key: &str) -> Result<Option<StoredBlob>> {
		let mut stmt = self.conn.prepare("SELECT data, content_type, cache_control FROM blobs WHERE key = ?1")?;
		let maybe = stmt
			.query_row(params![key], |row| {
				Ok(StoredBlob {
					data: row.get(0)?,
					content_type: row.get(1)?,
					cache_control: row.get(2)?,
				})
			})
			.optional()?;
		Ok(maybe)
	}

	/// プロンプトと応答の組を1行追加
	pub fn record_message(&mut self, ip: &str, prompt: &str, result: &str) -> Result<()> {
		let created = Self::now_ms()?;
		self.conn.execute(
			"INSERT INTO Messages (IP, Prompt, Result, created_at) VALUES (?1, ?2, ?3, ?4)",
			params![ip, prompt, result, created],
		)?;
		debug!(target: "sqlite", "message recorded ip={}", ip);
		Ok(())
	}

	/// 新しい順に最大 `limit` 件
	pub fn recent_messages(&self, limit: usize) -> Result<Vec<LoggedMessage>> {
		let mut stmt = self.conn.prepare(
			"SELECT IP, Prompt, Result, created_at FROM Messages ORDER BY id DESC LIMIT ?1",
		)?;
		let iter = stmt.query_map(params![limit as i64], |row| {
			Ok(LoggedMessage {
				ip: row.get(0)?,
				prompt: row.get(1)?,
				result: row.get(2)?,
				created_at: row.get(3)?,
			})
		})?;
		let mut out = Vec::new();
		for r in iter { out.push(r?); }
		Ok(out)
	}

	/// DB ファイルのパス
	pub fn db_file_path(&self) -> &Path { &self.path }
}

/// ロック取得 (poison はエラーとして返す)
pub(crate) fn lock(db: &SharedDb) -> Result<std::sync::MutexGuard<'_, Db>> {
	db.lock().map_err(|_| eyre!("sqlite connection mutex poisoned"))
}

/// ブロッキングスレッドでロックを取り、DB 操作を実行する
pub(crate) async fn with_db<T, F>(db: &SharedDb, op: F) -> Result<T>
where
	T: Send + 'static,
	F: FnOnce(&mut Db) -> Result<T> + Send + 'static,
{
	let db = db.clone();
	tokio::task::spawn_blocking(move || {
		let mut guard = lock(&db)?;
		op(&mut *guard)
	})
	.await
	.map_err(|e| eyre!("sqlite task join failed: {e}"))?
}
