/*
 * Responsibility
 * - auth: credential extraction / identity resolution / scope checks / pipeline
 * - cache: per-process identity cache
 */
pub mod auth;
pub mod cache;
