//! # POST /verify
//!
//! 再生回数で署名をゲートするエンドポイント。
//!
//! ## 処理フロー
//! 1. 必須フィールド（accessCredential, signingKeyId）を検証（外部呼び出し前）
//! 2. メトリクスプロバイダからチャンネル統計を取得
//! 3. 再生回数を閾値と比較（未満なら拒否レスポンスで終了、ネットワークには接続しない）
//! 4. 署名ネットワークに接続し、セッション認証情報を取得
//! 5. 署名アクションを実行し、結果を返却
//! 6. 接続を閉じる（4〜5の成否に関わらず）

mod handler;


pub use handler::handle_verify;

/// バリデーションエラー時のメッセージ
pub(crate) const MISSING_FIELDS_MESSAGE: &str = "accessCredential and signingKeyId are required";
