use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Form categories the engine knows how to fill. A prior classification step
/// decides which one applies; from here on the category is fixed for the
/// lifetime of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    NationalPension,
    MoveInReport,
    LandBuilding,
    YouthRentSubsidy,
    HousingBenefit,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::NationalPension,
        Category::MoveInReport,
        Category::LandBuilding,
        Category::YouthRentSubsidy,
        Category::HousingBenefit,
    ];

    /// Schema folder under the configured docs directory.
    pub fn folder_name(self) -> &'static str {
        match self {
            Category::NationalPension => "1_welfare",
            Category::MoveInReport => "2_report",
            Category::LandBuilding => "3_land",
            Category::YouthRentSubsidy => "4_monthly",
            Category::HousingBenefit => "5_salary",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            Category::NationalPension => "national-pension",
            Category::MoveInReport => "move-in-report",
            Category::LandBuilding => "land-building",
            Category::YouthRentSubsidy => "youth-rent-subsidy",
            Category::HousingBenefit => "housing-benefit",
        }
    }

    /// Human-facing label used in dialogue prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::NationalPension => "national pension",
            Category::MoveInReport => "move-in report",
            Category::LandBuilding => "land and building registry",
            Category::YouthRentSubsidy => "youth rent subsidy",
            Category::HousingBenefit => "housing benefit",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown category `{0}`")]
pub struct CategoryParseError(String);

impl FromStr for Category {
    type Err = CategoryParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.slug() == s)
            .ok_or_else(|| CategoryParseError(s.to_owned()))
    }
}

/// Field-id sets treated as one logical slot within a category. Once any
/// member holds a real value the whole group is satisfied and the value is
/// back-filled into the other members across every document.
///
/// Single-document categories carry no groups.
pub fn common_field_groups(category: Category) -> &'static [&'static [&'static str]] {
    match category {
        Category::YouthRentSubsidy => YOUTH_RENT_SUBSIDY_GROUPS,
        Category::NationalPension => NATIONAL_PENSION_GROUPS,
        Category::HousingBenefit => HOUSING_BENEFIT_GROUPS,
        Category::MoveInReport | Category::LandBuilding => &[],
    }
}

// Youth rent subsidy: the delegation form and the proxy-receipt form both
// describe the applicant (delegator == recipient) and the proxy (delegate ==
// representative recipient).
const YOUTH_RENT_SUBSIDY_GROUPS: &[&[&str]] = &[
    // applicant name
    &[
        "delegator.name",
        "recipient.name",
        "signature.applicant_name",
        "signature.reporter_name",
    ],
    // applicant birth date
    &["delegator.birthdate", "recipient.birthdate"],
    // applicant phone
    &["delegator.number", "recipient.number"],
    // applicant mobile
    &["recipient.mobile"],
    // applicant address
    &["delegator.address", "recipient.address"],
    // proxy name
    &["delegate.name", "representative_recipient.name"],
    // proxy birth date
    &["delegate.birthdate", "representative_recipient.birthdate"],
    // proxy phone
    &[
        "delegate.number",
        "representative_recipient.phone",
        "representative_recipient.number",
    ],
    // proxy address
    &["delegate.address", "representative_recipient.address"],
    // relationship between the two
    &[
        "delegate.relationship_to_delegator",
        "representative_recipient.relationship_to_recipient",
    ],
];

const NATIONAL_PENSION_GROUPS: &[&[&str]] = &[
    &[
        "person.name",
        "reporter.name",
        "subscriber.name",
        "signature.applicant_name",
        "signature.reporter_name",
    ],
    &[
        "person.resident_number",
        "reporter.resident_number",
        "subscriber.resident_number",
    ],
    &["person.phone", "reporter.phone", "subscriber.phone"],
    &["person.mobile", "reporter.mobile", "subscriber.mobile"],
    &["person.address", "reporter.address", "subscriber.address"],
];

const HOUSING_BENEFIT_GROUPS: &[&[&str]] = &[
    &[
        "recipient.name",
        "applicant.name",
        "signature.applicant_name",
        "signature.reporter_name",
        "bank_account.name",
    ],
    &["recipient.birthdate"],
    &["applicant.resident_number"],
    &["applicant.phone"],
    &["applicant.mobile"],
    &["recipient.address", "applicant.address.registered"],
    &["bank_account.bank_name"],
    &["bank_account.account_number"],
];
