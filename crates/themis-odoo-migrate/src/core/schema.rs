//! Fixed Themis table layouts and their destination attribute names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A Themis table read by the migration, with its column renaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Users,
    Companies,
    Contacts,
    CaseCategories,
    Cases,
    CaseDescriptionTypes,
    CaseDescriptions,
    PartyCategories,
    Parties,
    TimesheetTypes,
    CaseTimesheetTariffs,
    Timesheets,
    CostTypes,
    CaseCostTariffs,
    Costs,
    DocumentCategories,
    Documents,
}

/// `(source column, destination attribute)`
pub type FieldMapping = &'static [(&'static str, &'static str)];

const USER_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("NAAM", "name"),
    ("EMAIL", "email"),
    ("TELEFOON", "phone"),
    ("MOBIEL", "mobile"),
    ("UURTARIEF", "tariff"),
    ("ACTIEF", "active"),
];

const COMPANY_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("NAAM", "name"),
    ("BTWNUMMER", "vat"),
    ("ADRES", "street"),
    ("POSTCODE", "zip"),
    ("GEMEENTE", "city"),
    ("TELEFOON", "phone"),
    ("MOBIEL", "mobile"),
    ("EMAIL", "email"),
    ("EMAIL2", "email2"),
    ("EMAIL3", "email3"),
    ("URL", "website"),
    ("VENNOOTSCHAPSNAAM", "company_name"),
    ("LANDCODE", "country_code"),
    ("TAALCODE", "language"),
    ("ADRESCATEGORIE_ID", "category_id"),
    ("OPMERKING", "comment"),
    ("REKENINGNUMMER", "bank_number"),
    ("CREATED", "create_date"),
    ("CREATEDBY_ID", "create_uid"),
    ("MODIFIED", "write_date"),
];

const CONTACT_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("BEDRIJF_ID", "parent_id"),
    ("NAAMVOORNAAM", "name"),
    ("ADRES", "street"),
    ("POSTCODE", "zip"),
    ("MANUALZIP", "manualzip"),
    ("GEMEENTE", "city"),
    ("LANDCODE", "country_code"),
    ("TELEFOON", "phone"),
    ("MOBIEL", "mobile"),
    ("EMAIL", "email"),
    ("EMAIL2", "email2"),
    ("EMAIL3", "email3"),
    ("BEROEP", "function"),
    ("NAAM", "lastname"),
    ("VOORNAAM", "firstname"),
    ("GESLACHT", "gender"),
    ("GEBOORTEDATUM", "dateofbirth"),
    ("GEBOORTEPLAATS", "placeofbirth"),
    ("NATIONALITEIT", "nationality"),
    ("INSZ", "national_number"),
    ("TAALCODE", "language"),
    ("URL", "website"),
    ("ADRESCATEGORIE_ID", "category_id"),
    ("OPMERKING", "comment"),
    ("REKENINGNUMMER", "bank_number"),
    ("CREATED", "create_date"),
    ("CREATEDBY_ID", "create_uid"),
    ("MODIFIED", "write_date"),
];

const CASE_CATEGORY_FIELDS: FieldMapping = &[("ID", "id"), ("NEDERLANDS", "name")];

const CASE_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("OMSCHRIJVING", "name"),
    ("NUMMER", "reference_number"),
    ("DOSSIERCATEGORIE_ID", "category_id"),
    ("GEARCHIVEERD", "archived"),
    ("VERANTWOORDELIJKE_ID", "user_id"),
    ("FACTUURBEDRIJF_ID", "invoice_company_id"),
    ("FACTUURADRESBOEK_ID", "invoice_contact_id"),
    ("UURTARIEF", "tariff"),
    ("OPENINGSDATUM", "create_date"),
    ("CREATEDBY_ID", "create_uid"),
    ("MODIFIED", "write_date"),
];

const CASE_DESCRIPTION_TYPE_FIELDS: FieldMapping = &[("ID", "id"), ("N", "name")];

const CASE_DESCRIPTION_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("OPMERKINGTYPE_ID", "type_id"),
    ("OPMERKING", "description"),
];

const PARTY_CATEGORY_FIELDS: FieldMapping = &[("ID", "id"), ("OMSCHRIJVING", "name")];

const PARTY_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("ADRESBOEK_ID", "contact_id"),
    ("DOSSIERADRESCATEGORIE_ID", "category_id"),
    ("BEDRIJF_ID", "company_id"),
];

const TIMESHEET_TYPE_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("OMSCHRIJVING", "name"),
    ("TARIEF", "list_price"),
];

const CASE_TIMESHEET_TARIFF_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("GEBRUIKER_ID", "user_id"),
    ("TARIEF", "price_unit"),
];

const TIMESHEET_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("GEBRUIKER_ID", "user_id"),
    ("PRESTATIECODE_ID", "type_id"),
    ("DATUM", "date"),
    ("OMSCHRIJVING", "name"),
    ("MINUTEN", "minutes"),
    ("TARIEF", "price_unit"),
    ("AANREKENBAAR", "billable"),
    ("GEFACTUREERD", "billed"),
];

const COST_TYPE_FIELDS: FieldMapping = &[
    ("ID", "id"),
    ("OMSCHRIJVING", "name"),
    ("PRIJS", "list_price"),
];

const CASE_COST_TARIFF_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("KOSTENCODE_ID", "type_id"),
    ("PRIJS", "price_unit"),
];

const COST_FIELDS: FieldMapping = &[
    ("DOSSIER_ID", "case_id"),
    ("KOSTENCODE_ID", "type_id"),
    ("DATUM", "date"),
    ("OMSCHRIJVING", "name"),
    ("AANTAL", "amount"),
    ("EENHEIDSPRIJS", "price_unit"),
    ("BEDRAG", "price"),
    ("AANREKENBAAR", "billable"),
    ("GEFACTUREERD", "billed"),
];

const DOCUMENT_CATEGORY_FIELDS: FieldMapping = &[("ID", "id"), ("OMSCHRIJVING", "name")];

const DOCUMENT_FIELDS: FieldMapping = &[
    ("LINKEDTO_ID", "case_id"),
    ("OMSCHRIJVING", "name"),
    ("BESTAND", "filename"),
    ("DOCUMENTMAP_ID", "category_id"),
    ("AANMAKER_ID", "create_uid"),
    ("AANMAAKDATUM", "create_date"),
    ("AANPASDATUM", "write_date"),
];

impl Entity {
    /// Themis table name.
    pub fn table(self) -> &'static str {
        match self {
            Entity::Users => "GEBRUIKER",
            Entity::Companies => "BEDRIJF",
            Entity::Contacts => "ADRESBOEK",
            Entity::CaseCategories => "DOSSIERCATEGORIE",
            Entity::Cases => "DOSSIER",
            Entity::CaseDescriptionTypes => "OPMERKINGTYPE",
            Entity::CaseDescriptions => "DOSSIEROPMERKING",
            Entity::PartyCategories => "ADRESCATEGORIE",
            Entity::Parties => "DOSSIERADRESBOEK",
            Entity::TimesheetTypes => "PRESTATIECODE",
            Entity::CaseTimesheetTariffs => "DOSSIERTARIEF",
            Entity::Timesheets => "PRESTATIE",
            Entity::CostTypes => "KOSTENCODE",
            Entity::CaseCostTariffs => "DOSSIERKOSTENTARIEF",
            Entity::Costs => "KOST",
            Entity::DocumentCategories => "DOSSIERDOCUMENTMAP",
            Entity::Documents => "DOSSIERDOCUMENT",
        }
    }

    pub fn fields(self) -> FieldMapping {
        match self {
            Entity::Users => USER_FIELDS,
            Entity::Companies => COMPANY_FIELDS,
            Entity::Contacts => CONTACT_FIELDS,
            Entity::CaseCategories => CASE_CATEGORY_FIELDS,
            Entity::Cases => CASE_FIELDS,
            Entity::CaseDescriptionTypes => CASE_DESCRIPTION_TYPE_FIELDS,
            Entity::CaseDescriptions => CASE_DESCRIPTION_FIELDS,
            Entity::PartyCategories => PARTY_CATEGORY_FIELDS,
            Entity::Parties => PARTY_FIELDS,
            Entity::TimesheetTypes => TIMESHEET_TYPE_FIELDS,
            Entity::CaseTimesheetTariffs => CASE_TIMESHEET_TARIFF_FIELDS,
            Entity::Timesheets => TIMESHEET_FIELDS,
            Entity::CostTypes => COST_TYPE_FIELDS,
            Entity::CaseCostTariffs => CASE_COST_TARIFF_FIELDS,
            Entity::Costs => COST_FIELDS,
            Entity::DocumentCategories => DOCUMENT_CATEGORY_FIELDS,
            Entity::Documents => DOCUMENT_FIELDS,
        }
    }

    /// Source column names, in mapping order.
    pub fn columns(self) -> Vec<&'static str> {
        self.fields().iter().map(|(col, _)| *col).collect()
    }

    /// Human-readable plural, used in log lines.
    pub fn label(self) -> &'static str {
        match self {
            Entity::Users => "users",
            Entity::Companies => "companies",
            Entity::Contacts => "contacts",
            Entity::CaseCategories => "case categories",
            Entity::Cases => "cases",
            Entity::CaseDescriptionTypes => "case description types",
            Entity::CaseDescriptions => "case descriptions",
            Entity::PartyCategories => "party categories",
            Entity::Parties => "parties",
            Entity::TimesheetTypes => "timesheet types",
            Entity::CaseTimesheetTariffs => "case timesheet tariffs",
            Entity::Timesheets => "timesheets",
            Entity::CostTypes => "cost types",
            Entity::CaseCostTariffs => "case cost tariffs",
            Entity::Costs => "costs",
            Entity::DocumentCategories => "document categories",
            Entity::Documents => "documents",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}
