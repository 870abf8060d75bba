//! # Typed Endpoints
//!
//! Adapters between the mux and user handlers. A typed handler is a plain function
//! over a [`Context`](crate::Context) whose request body type `B` and return type
//! `R` drive both the request pipeline and the response pipeline:
//!
//! ```rust,ignore
//! fn create(ctx: &mut Context<'_, NewPet>) -> anyhow::Result<Pet> {
//!     let pet = store.insert(ctx.take_body())?;
//!     ctx.set_status(201);
//!     Ok(pet)
//! }
//! ```
//!
//! Both kinds of adapter are erased behind [`Endpoint`] so the mux can store routes
//! of different shapes side by side.

mod core;

pub use self::core::Endpoint;
pub(crate) use self::core::{DeclaredQuery, StdEndpoint, TypedEndpoint};
