/*!
 * Identity context extractor
 *
 * Responsibility:
 * - 認証済みリクエストの Identity を handler に提供する
 * - Identity の型定義は services::auth 側 (middleware と共有)
 *
 * Public API:
 * - IdentityCtx
 */

mod core;

pub use core::IdentityCtx;
