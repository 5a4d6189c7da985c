use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rentdesk_core::{AuditStamp, BrandId, DomainError, DomainResult, Entity, UserId, validate};

#[derive(Debug, Clone, Deserialize)]
pub struct BrandInput {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Brand {
    id: BrandId,
    name: String,
    code: Option<String>,
    description: Option<String>,
    audit: AuditStamp,
}

impl Entity for Brand {
    type Id = BrandId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_active(&self) -> bool {
        self.audit.is_active
    }
}

struct Validated {
    name: String,
    code: Option<String>,
    description: Option<String>,
}

fn validate_input(input: &BrandInput) -> DomainResult<Validated> {
    let code = match input.code.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(code) => Some(validate::code("brand code", code, 20)?),
    };
    Ok(Validated {
        name: validate::required_text("brand name", &input.name, 100)?,
        code,
        description: validate::optional_text("description", input.description.as_deref(), 1000)?,
    })
}

impl Brand {
    pub fn create(id: BrandId, input: &BrandInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<Self> {
        let v = validate_input(input)?;
        Ok(Self {
            id,
            name: v.name,
            code: v.code,
            description: v.description,
            audit: AuditStamp::new(actor, now),
        })
    }

    pub fn id_typed(&self) -> BrandId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn audit(&self) -> &AuditStamp {
        &self.audit
    }

    pub fn display_name(&self) -> String {
        match &self.code {
            Some(code) => format!("{} ({code})", self.name),
            None => self.name.clone(),
        }
    }

    pub fn update_info(&mut self, input: &BrandInput, actor: Option<UserId>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active()?;
        let v = validate_input(input)?;
        self.name = v.name;
        self.code = v.code;
        self.description = v.description;
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
            return Err(DomainError::not_found(format!("brand {}", self.id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, code: Option<&str>) -> BrandInput {
        BrandInput {
            name: name.to_string(),
            code: code.map(str::to_string),
            description: None,
        }
    }

    #[test]
    fn code_is_normalized_and_checked() {
        let brand = Brand::create(BrandId::new(), &input(" Coleman ", Some("cole-01")), None, Utc::now()).unwrap();
        assert_eq!(brand.name(), "Coleman");
        assert_eq!(brand.code(), Some("COLE-01"));
        assert_eq!(brand.display_name(), "Coleman (COLE-01)");

        assert!(Brand::create(BrandId::new(), &input("X", Some("bad code")), None, Utc::now()).is_err());
        assert!(Brand::create(BrandId::new(), &input("X", Some(&"A".repeat(21))), None, Utc::now()).is_err());
    }

    #[test]
    fn deleted_brand_cannot_be_edited() {
        let mut brand = Brand::create(BrandId::new(), &input("Coleman", None), None, Utc::now()).unwrap();
        brand.delete(None, Utc::now()).unwrap();
        assert!(matches!(
            brand.update_info(&input("Other", None), None, Utc::now()),
            Err(DomainError::NotFound(_))
        ));
    }
}
