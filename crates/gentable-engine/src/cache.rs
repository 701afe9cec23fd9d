//! Compiled-formula cache shared by every clone of an [`Engine`](crate::Engine).

use std::sync::Arc;

use dashmap::DashMap;

use crate::expr::Expr;

/// Formula text to parsed tree. Parsing is pure, so entries never go stale.
pub type ExprCache = Arc<DashMap<String, Arc<Expr>>>;
