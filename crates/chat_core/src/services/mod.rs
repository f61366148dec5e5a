//! サービス層
//!
//! HTTP 層から独立した形でリクエスト単位の処理を提供する。

pub mod chat_service;

pub use chat_service::{ChatService, NO_OUTPUT};
