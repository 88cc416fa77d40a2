/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth: identity 解決 + scope 認可 (protected route group 単位で mount)
 * - http: request-id / access log / body limit / timeout
 */
pub mod auth;
pub mod http;
