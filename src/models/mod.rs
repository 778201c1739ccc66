// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod identity;
pub mod todo;
pub mod user;

pub use identity::Identity;
pub use todo::{ListSnapshot, TodoItem};
pub use user::{ProfilePatch, RewardState, UserProfile};
