//! GraphQL type definitions.

use async_graphql::{EmptyMutation, EmptySubscription, Schema};

use crate::schema::DemoQuery;

/// The demo GraphQL schema type.
pub type PagewiseSchema = Schema<DemoQuery, EmptyMutation, EmptySubscription>;
