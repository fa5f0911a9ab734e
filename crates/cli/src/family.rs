//! Family classes - Addresses, people, parents and households
//!
//! The domain used by the `demo` and `plan` commands. Each class is a thin
//! [`Entity`] handle; all relationship state lives in the integrity facade.

use kindred_orm::{
    Entity, IntegrityResult, ObjectId, PropertyOptions, Registry, RegistryBuilder, RelationshipIntegrity,
};
use serde_json::json;

macro_rules! entity_handle {
    ($name:ident) => {
        #[derive(Debug, Clone)]
        pub struct $name {
            id: ObjectId,
            integrity: RelationshipIntegrity,
        }

        impl PartialEq for $name {
            fn eq(&self, other: &Self) -> bool {
                self.id == other.id
            }
        }
    };
}

entity_handle!(Address);
entity_handle!(Person);
entity_handle!(Parent);
entity_handle!(Household);

macro_rules! entity_parts {
    () => {
        fn from_parts(id: ObjectId, integrity: RelationshipIntegrity) -> Self {
            Self { id, integrity }
        }

        fn id(&self) -> ObjectId {
            self.id
        }

        fn integrity(&self) -> &RelationshipIntegrity {
            &self.integrity
        }
    };
}

impl Entity for Address {
    const CLASS: &'static str = "Address";

    fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
        builder
            .register(Self::CLASS, "street", PropertyOptions::plain())?
            .register(Self::CLASS, "city", PropertyOptions::plain())?
            .register(Self::CLASS, "postal_code", PropertyOptions::plain())?
            .register(Self::CLASS, "zip", PropertyOptions::alias("postal_code"))?;
        Ok(())
    }

    entity_parts!();
}

impl Entity for Person {
    const CLASS: &'static str = "Person";

    fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
        builder
            .register(Self::CLASS, "name", PropertyOptions::plain())?
            .register(Self::CLASS, "ssn", PropertyOptions::secondary_key())?
            .register(Self::CLASS, "address", PropertyOptions::dependent(Address::CLASS).logical(true))?
            .register(Self::CLASS, "parent", PropertyOptions::reference(Parent::CLASS).inverse("children"))?;
        Ok(())
    }

    entity_parts!();
}

impl Parent {
    fn declare_with(builder: &mut RegistryBuilder, logical_children: bool) -> IntegrityResult<()> {
        builder
            .register(Self::CLASS, "name", PropertyOptions::plain())?
            .register(Self::CLASS, "ssn", PropertyOptions::secondary_key())?
            .register(Self::CLASS, "spouse", PropertyOptions::reference(Self::CLASS).inverse("spouse"))?
            .register(
                Self::CLASS,
                "household",
                PropertyOptions::reference(Household::CLASS).inverse("members"),
            )?
            .register(
                Self::CLASS,
                "children",
                PropertyOptions::dependent(Person::CLASS)
                    .many()
                    .logical(logical_children)
                    .inverse("parent"),
            )?;
        Ok(())
    }

    pub fn spouse(&self) -> IntegrityResult<Option<Parent>> {
        Ok(self.related("spouse")?.into_iter().next())
    }

    pub fn marry(&self, other: &Parent) -> IntegrityResult<()> {
        self.link("spouse", other).map(|_| ())
    }

    pub fn children(&self) -> IntegrityResult<Vec<Person>> {
        self.related("children")
    }

    pub fn adopt(&self, child: &Person) -> IntegrityResult<()> {
        self.link("children", child).map(|_| ())
    }
}

impl Entity for Parent {
    const CLASS: &'static str = "Parent";

    /// Declares `children` as logically cascaded
    fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
        Self::declare_with(builder, true)
    }

    entity_parts!();
}

impl Entity for Household {
    const CLASS: &'static str = "Household";

    fn declare(builder: &mut RegistryBuilder) -> IntegrityResult<()> {
        builder
            .register(Self::CLASS, "name", PropertyOptions::plain())?
            .register(
                Self::CLASS,
                "members",
                PropertyOptions::reference(Parent::CLASS).inverse("household").many(),
            )?;
        Ok(())
    }

    entity_parts!();
}

impl Household {
    pub fn members(&self) -> IntegrityResult<Vec<Parent>> {
        self.related("members")
    }
}

impl Person {
    pub fn parent(&self) -> IntegrityResult<Option<Parent>> {
        Ok(self.related("parent")?.into_iter().next())
    }

    pub fn address(&self) -> IntegrityResult<Option<Address>> {
        Ok(self.related("address")?.into_iter().next())
    }
}

/// Descriptor table of the family classes
///
/// `logical_children` selects whether saving a parent cascades to its
/// children or leaves them to the storage backend.
pub fn family_registry(logical_children: bool) -> IntegrityResult<Registry> {
    let mut builder = Registry::builder();
    Address::declare(&mut builder)?;
    Person::declare(&mut builder)?;
    Parent::declare_with(&mut builder, logical_children)?;
    Household::declare(&mut builder)?;
    builder.build()
}

/// Handles created by [`populate`]
#[derive(Debug, Clone)]
pub struct Family {
    pub household: Household,
    pub parents: (Parent, Parent),
    pub children: Vec<Person>,
    pub address: Address,
}

/// Build two married parents sharing a household, `children` kids and one address
pub fn populate(integrity: &RelationshipIntegrity, children: usize) -> IntegrityResult<Family> {
    let household = Household::create(integrity)?;
    household.set_relationship("name", json!("Lovelace"))?;

    let ada = Parent::create(integrity)?;
    ada.set_relationship("name", json!("Ada"))?;
    ada.set_relationship("ssn", json!("078-05-1120"))?;
    let william = Parent::create(integrity)?;
    william.set_relationship("name", json!("William"))?;
    william.set_relationship("ssn", json!("219-09-9999"))?;

    ada.marry(&william)?;
    ada.set_relationship("household", household.id())?;
    household.link("members", &william)?;

    let address = Address::create(integrity)?;
    address.set_relationship("street", json!("12 St James's Square"))?;
    address.set_relationship("city", json!("London"))?;
    address.set_relationship("zip", json!("SW1Y 4JH"))?;

    let mut kids = Vec::with_capacity(children);
    for index in 0..children {
        let kid = Person::create(integrity)?;
        kid.set_relationship("name", json!(format!("Child {}", index + 1)))?;
        ada.adopt(&kid)?;
        kids.push(kid);
    }
    if let Some(first) = kids.first() {
        first.set_relationship("address", address.id())?;
    }

    Ok(Family {
        household,
        parents: (ada, william),
        children: kids,
        address,
    })
}
