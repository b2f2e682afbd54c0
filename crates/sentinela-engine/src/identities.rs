//! Identity registration and bearer-token lookup.

use std::sync::Arc;

use rand_core::OsRng;
use sentinela_core::{
  Error, Result,
  clock::Clock,
  geo::GeoPoint,
  identity::{Identity, IdentityUpsert, canonical_contact, generate_token, normalize_token},
  store::AlertStore,
};
use uuid::Uuid;

/// Fresh tokens drawn before giving up on a collision-free one.
const MAX_TOKEN_ATTEMPTS: usize = 8;

pub struct IdentityService<S> {
  store:        Arc<S>,
  clock:        Arc<dyn Clock>,
  token_length: usize,
}

impl<S: AlertStore> IdentityService<S> {
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, token_length: usize) -> Self {
    Self { store, clock, token_length }
  }

  /// Register a reporter, or refresh the existing identity with the same
  /// contact. The token of an existing identity never changes.
  ///
  /// Two first-time registrations for one contact may race; the loser's
  /// insert fails on the unique contact, and it then refreshes the winner's
  /// row instead.
  pub async fn upsert(&self, input: IdentityUpsert) -> Result<Identity> {
    let contact = canonical_contact(&input.contact)?;
    let display_name = input.display_name.trim();
    if display_name.is_empty() {
      return Err(Error::Validation("display name is required".into()));
    }
    if input.default_location.is_some_and(|p| !p.is_valid()) {
      return Err(Error::Validation("default location has invalid coordinates".into()));
    }
    let default_address = input
      .default_address
      .as_deref()
      .map(str::trim)
      .filter(|a| !a.is_empty())
      .map(str::to_owned);

    let now = self.clock.now();
    let existing = self
      .store
      .find_identity_by_contact(contact.clone())
      .await
      .map_err(Error::persistence)?;

    let mut identity = match existing {
      Some(identity) => identity,
      None => {
        let registered = self
          .register(
            contact.clone(),
            display_name.to_owned(),
            default_address.clone(),
            input.default_location,
          )
          .await;
        let err = match registered {
          Ok(identity) => return Ok(identity),
          Err(e) => e,
        };
        let winner = self
          .store
          .find_identity_by_contact(contact)
          .await
          .map_err(Error::persistence)?;
        match winner {
          Some(identity) => {
            tracing::debug!(
              identity_id = %identity.identity_id,
              "contact registered concurrently, refreshing it"
            );
            identity
          }
          None => return Err(err),
        }
      }
    };

    identity.display_name = display_name.to_owned();
    if default_address.is_some() {
      identity.default_address = default_address;
    }
    if input.default_location.is_some() {
      identity.default_location = input.default_location;
    }
    identity.updated_at = now;

    let id = identity.identity_id;
    let identity = self
      .store
      .update_identity(identity)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::IdentityNotFound(id))?;
    tracing::debug!(identity_id = %id, "identity refreshed");
    Ok(identity)
  }

  async fn register(
    &self,
    contact: String,
    display_name: String,
    default_address: Option<String>,
    default_location: Option<GeoPoint>,
  ) -> Result<Identity> {
    for _ in 0..MAX_TOKEN_ATTEMPTS {
      let token = generate_token(&mut OsRng, self.token_length);
      let taken = self
        .store
        .find_identity_by_token(token.clone())
        .await
        .map_err(Error::persistence)?;
      if taken.is_some() {
        tracing::debug!("token collision, drawing again");
        continue;
      }

      let now = self.clock.now();
      let identity = self
        .store
        .insert_identity(Identity {
          identity_id: Uuid::new_v4(),
          display_name,
          contact,
          token,
          default_address,
          default_location,
          created_at: now,
          updated_at: now,
        })
        .await
        .map_err(Error::persistence)?;
      tracing::info!(identity_id = %identity.identity_id, "identity registered");
      return Ok(identity);
    }
    Err(Error::Persistence(
      format!("no free token after {MAX_TOKEN_ATTEMPTS} attempts").into(),
    ))
  }

  /// Resolve a bearer token. Matching ignores case and surrounding space.
  pub async fn find_by_token(&self, token: &str) -> Result<Identity> {
    let token = normalize_token(token);
    if token.is_empty() {
      return Err(Error::UnknownToken);
    }
    self
      .store
      .find_identity_by_token(token)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::UnknownToken)
  }

  pub async fn get(&self, id: Uuid) -> Result<Identity> {
    self
      .store
      .get_identity(id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::IdentityNotFound(id))
  }
}
