use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, DomainError, DomainResult, Entity, LocationId, UserId, validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LocationType {
    Store,
    Warehouse,
    ServiceCenter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub code: String,
    pub name: String,
    pub location_type: LocationType,
    pub address: String,
    pub city: String,
    pub state: String,
    pub country: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub contact_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub manager_user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
    code: String,
    name: String,
    location_type: LocationType,
    address: String,
    city: String,
    state: String,
    country: String,
    postal_code: Option<String>,
    contact_number: Option<String>,
    email: Option<String>,
    manager_user_id: Option<UserId>,
    audit: AuditStamp,
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

impl Location {
    pub fn create(
        id: LocationId,
        input: &LocationInput,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let mut location = Self {
            id,
            code: String::new(),
            name: String::new(),
            location_type: input.location_type,
            address: String::new(),
            city: String::new(),
            state: String::new(),
            country: String::new(),
            postal_code: None,
            contact_number: None,
            email: None,
            manager_user_id: None,
            audit: AuditStamp::new(actor, now),
        };
        location.apply(input)?;
        Ok(location)
    }

    fn apply(&mut self, input: &LocationInput) -> DomainResult<()> {
        let code = validate::code("location code", &input.code, 20)?;
        let name = validate::required_text("location name", &input.name, 100)?;
        let address = validate::required_text("address", &input.address, 500)?;
        let city = validate::required_text("city", &input.city, 100)?;
        let state = validate::required_text("state", &input.state, 100)?;
        let country = validate::required_text("country", &input.country, 100)?;
        let postal_code = validate::optional_text("postal code", input.postal_code.as_deref(), 20)?;
        let contact_number = validate::optional_text("contact number", input.contact_number.as_deref(), 20)?;
        let email = validate::optional_email("email", input.email.as_deref())?;

        self.code = code;
        self.name = name;
        self.location_type = input.location_type;
        self.address = address;
        self.city = city;
        self.state = state;
        self.country = country;
        self.postal_code = postal_code;
        self.contact_number = contact_number;
        self.email = email;
        self.manager_user_id = input.manager_user_id;
        Ok(())
    }

    pub fn id_typed(&self) -> LocationId {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location_type(&self) -> LocationType {
        self.location_type
    }

    pub fn manager_user_id(&self) -> Option<UserId> {
        self.manager_user_id
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    /// `address, city, state postal, country` with empty parts omitted.
    pub fn full_address(&self) -> String {
        let state_line = match &self.postal_code {
            Some(postal) => format!("{} {postal}", self.state),
            None => self.state.clone(),
        };
        [self.address.as_str(), self.city.as_str(), state_line.as_str(), self.country.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn update(&mut self, input: &LocationInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.apply(input)?;
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn assign_manager(&mut self, manager: UserId, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.manager_user_id = Some(manager);
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn remove_manager(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        if self.manager_user_id.take().is_none() {
            return Err(DomainError::invariant("location has no manager"));
        }
        self.audit.touch(actor, now);
        Ok(())
    }

    pub fn delete(&mut self, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        self.audit.deactivate(actor, now);
        Ok(())
    }

    fn ensure_active(&self) -> DomainResult<()> {
        if !self.audit.is_active {
            return Err(DomainError::not_found(format!("location {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> LocationInput {
        LocationInput {
            code: "main".into(),
            name: "Main Store".into(),
            location_type: LocationType::Store,
            address: "12 Harbour Rd".into(),
            city: "Portsmouth".into(),
            state: "Hampshire".into(),
            country: "UK".into(),
            postal_code: Some("PO1 2AB".into()),
            contact_number: None,
            email: Some("Store@Example.com".into()),
            manager_user_id: None,
        }
    }

    #[test]
    fn create_normalizes_fields() {
        let loc = Location::create(LocationId::new(), &input(), None, Utc::now()).unwrap();
        assert_eq!(loc.code(), "MAIN");
        assert_eq!(loc.full_address(), "12 Harbour Rd, Portsmouth, Hampshire PO1 2AB, UK");
    }

    #[test]
    fn manager_assignment_round_trip() {
        let mut loc = Location::create(LocationId::new(), &input(), None, Utc::now()).unwrap();
        assert!(loc.remove_manager(None, Utc::now()).is_err());
        let manager = UserId::new();
        loc.assign_manager(manager, None, Utc::now()).unwrap();
        assert_eq!(loc.manager_user_id(), Some(manager));
        loc.remove_manager(None, Utc::now()).unwrap();
        assert_eq!(loc.manager_user_id(), None);
    }

    #[test]
    fn invalid_email_is_rejected() {
        let mut bad = input();
        bad.email = Some("not-an-email".into());
        assert!(matches!(
            Location::create(LocationId::new(), &bad, None, Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }
}
