use color_eyre::Result;
use tracing::warn;

use super::{with_db, SharedDb};

/// `Messages` テーブルの1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedMessage {
	pub ip: String,
	pub prompt: String,
	pub result: String,
	/// ms since epoch
	pub created_at: i64,
}

/// プロンプト/応答の記録先。書き込み失敗は呼び出し側に伝えない。
#[derive(Clone)]
pub struct MessageLog {
	db: SharedDb,
}

impl MessageLog {
	pub fn new(db: SharedDb) -> Self {
		Self { db }
	}

	/// 記録する (fire-and-forget)。失敗は warn ログのみ。
	pub async fn record(&self, ip: &str, prompt: &str, result: &str) {
		if let Err(e) = self.try_record(ip, prompt, result).await {
			warn!(target: "sqlite", error = %e, "failed to record message");
		}
	}

	pub async fn try_record(&self, ip: &str, prompt: &str, result: &str) -> Result<()> {
		let (ip, prompt, result) = (ip.to_string(), prompt.to_string(), result.to_string());
		with_db(&self.db, move |db| db.record_message(&ip, &prompt, &result)).await
	}

	pub async fn recent(&self, limit: usize) -> Result<Vec<LoggedMessage>> {
		with_db(&self.db, move |db| db.recent_messages(limit)).await
	}
}

#[cfg(test)]
mod tests {
	use std::time::{Duration, Instant};

	use super::*;
	use crate::sqlite::Db;

	#[tokio::test]
	async fn record_and_read_back() -> Result<()> {
		let log = MessageLog::new(Db::in_memory()?.into_shared());
		log.record("10.0.0.1", "what is rust?", "a language").await;
		let rows = log.recent(5).await?;
		assert_eq!(rows.len(), 1);
		assert_eq!(rows[0].result, "a language");
		assert!(rows[0].created_at > 0);
		Ok(())
	}

	#[tokio::test(flavor = "current_thread")]
	async fn recording_behind_a_held_lock_lets_timers_fire() -> Result<()> {
		let db = Db::in_memory()?.into_shared();
		let log = MessageLog::new(db.clone());

		let (locked_tx, locked_rx) = std::sync::mpsc::channel();
		let holder = std::thread::spawn(move || {
			let _guard = db.lock().unwrap();
			locked_tx.send(()).unwrap();
			std::thread::sleep(Duration::from_millis(400));
		});
		locked_rx.recv().unwrap();

		let started = Instant::now();
		let timer = tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(10)).await;
			started.elapsed()
		});
		log.record("", "slow", "write").await;
		let timer_elapsed = timer.await.unwrap();
		holder.join().unwrap();

		assert!(timer_elapsed < Duration::from_millis(200), "timer stalled for {timer_elapsed:?}");
		assert_eq!(log.recent(1).await?[0].prompt, "slow");
		Ok(())
	}
}
