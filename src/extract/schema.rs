//! Per-site extraction schemas.
//!
//! A schema is the ordered candidate-path table for every output field plus
//! the handful of site constants (domain, payload selector hints). The
//! engine is site-agnostic; targeting the sister portal means supplying
//! another one of these, not touching the stage or worker code.

/// Candidate paths for one detail-page (ADVIEW) extraction, evaluated
/// against the designated `props.pageProps.pageData.data` subtree.
#[derive(Debug)]
pub struct DetailSchema {
    /// Absolute-URL prefix for site-relative links.
    pub domain: &'static str,
    pub url: &'static [&'static str],
    pub title: &'static [&'static str],
    pub property_type: &'static [&'static str],
    pub address: &'static [&'static str],
    pub state: &'static [&'static str],
    pub district: &'static [&'static str],
    pub subarea: &'static [&'static str],
    pub lister_name: &'static [&'static str],
    pub lister_url: &'static [&'static str],
    pub phone: &'static [&'static str],
    pub phone_secondary: &'static [&'static str],
    pub agency_name: &'static [&'static str],
    pub agency_registration: &'static [&'static str],
    pub ren: &'static [&'static str],
    pub price: &'static [&'static str],
    pub currency: &'static [&'static str],
    pub rooms: &'static [&'static str],
    pub toilets: &'static [&'static str],
    pub car_park: &'static [&'static str],
    pub psf: &'static [&'static str],
    pub floor_area: &'static [&'static str],
    pub floor_area_unit: &'static [&'static str],
    pub land_area: &'static [&'static str],
    pub tenure: &'static [&'static str],
    pub property_title: &'static [&'static str],
    pub bumi_lot: &'static [&'static str],
    pub total_units: &'static [&'static str],
    pub completion_year: &'static [&'static str],
    pub developer: &'static [&'static str],
    pub rent_sale: &'static [&'static str],
    pub furnishing_strict: &'static [&'static str],
}

/// Candidate paths for one search-result page (ADLIST) extraction: where the
/// listings array lives, and the per-item fields.
#[derive(Debug)]
pub struct ListSchema {
    pub domain: &'static str,
    pub items: &'static [&'static str],
    pub url: &'static [&'static str],
    pub title: &'static [&'static str],
    pub updated: &'static [&'static str],
    pub listed: &'static [&'static str],
    pub agent_name: &'static [&'static str],
    pub agent_id: &'static [&'static str],
    pub listing_id: &'static [&'static str],
}

/// Detail schema for the primary portal. Path lists embody the observed
/// payload variations; order matters, first non-empty wins.
pub static PROPERTYGURU_DETAIL: DetailSchema = DetailSchema {
    domain: "https://www.propertyguru.com.my",
    url: &["listingData.url"],
    title: &["listingData.localizedTitle", "listingData.title"],
    property_type: &[
        "propertyOverviewData.propertyInfo.propertyType",
        "listingData.propertyType",
        "listingData.property.typeText",
        "listingData.property.type",
    ],
    address: &[
        "propertyOverviewData.propertyInfo.fullAddress",
        "listingData.displayAddress",
        "listingData.address",
        "listingData.property.addressText",
    ],
    state: &[
        "propertyOverviewData.propertyInfo.stateName",
        "listingData.property.stateName",
        "listingData.stateName",
    ],
    district: &[
        "propertyOverviewData.propertyInfo.districtName",
        "listingData.property.districtName",
        "listingData.districtName",
        "listingData.districtText",
    ],
    subarea: &[
        "propertyOverviewData.propertyInfo.areaName",
        "listingData.property.areaName",
        "listingData.areaName",
        "listingData.areaText",
    ],
    lister_name: &[
        "contactAgentData.contactAgentCard.agentInfoProps.agent.name",
        "listingData.agent.name",
    ],
    lister_url: &[
        "contactAgentData.contactAgentCard.agentInfoProps.agent.profileUrl",
        "listingData.agent.profileUrl",
        "listingData.agent.url",
    ],
    phone: &[
        "contactAgentData.contactAgentCard.agentInfoProps.agent.mobile",
        "listingData.agent.contactNumbers.0.number",
        "listingData.agent.contactNumbers.0.displayNumber",
        "listingData.agent.phoneNumber",
        "listingData.agent.mobile",
        "listingData.agent.contactNumber",
    ],
    phone_secondary: &[
        "contactAgentData.contactAgentCard.agentInfoProps.agent.phone",
        "listingData.agent.contactNumbers.1.number",
        "listingData.agent.contactNumbers.1.displayNumber",
        "listingData.agent.secondaryPhone",
    ],
    agency_name: &[
        "contactAgentData.contactAgentCard.agency.name",
        "listingData.agent.agency.name",
        "listingData.agent.agencyName",
    ],
    agency_registration: &[
        "contactAgentData.contactAgentCard.agency.registrationNumber",
        "contactAgentData.contactAgentCard.agency.licenseNo",
        "listingData.agent.agency.registrationNumber",
        "listingData.agent.agency.registrationNo",
        "listingData.agent.agency.regNo",
    ],
    ren: &[
        "listingData.agent.licenseNumber",
        "listingData.agent.renNo",
        "listingData.agent.registrationNo",
        "listingData.agent.ren",
        "contactAgentData.contactAgentCard.agentInfoProps.agent.licenseNumber",
    ],
    price: &[
        "propertyOverviewData.propertyInfo.price.amount",
        "listingData.priceValue",
        "listingData.pricePretty",
        "listingData.price",
    ],
    currency: &[
        "propertyOverviewData.propertyInfo.price.currency",
        "listingData.currency",
    ],
    rooms: &[
        "propertyOverviewData.propertyInfo.bedrooms",
        "listingData.property.bedrooms",
        "listingData.bedrooms",
    ],
    toilets: &[
        "propertyOverviewData.propertyInfo.bathrooms",
        "listingData.property.bathrooms",
        "listingData.bathrooms",
    ],
    car_park: &[
        "propertyOverviewData.propertyInfo.carPark",
        "listingData.property.carPark",
        "listingData.carPark",
        "listingData.carParks",
    ],
    psf: &[
        "propertyOverviewData.propertyInfo.price.perSqft",
        "propertyOverviewData.propertyInfo.pricePerSqft",
        "listingData.floorAreaPsf",
    ],
    floor_area: &[
        "propertyOverviewData.propertyInfo.builtUp.size",
        "propertyOverviewData.propertyInfo.builtUpSqft",
        "listingData.floorArea",
        "listingData.property.builtUpArea",
    ],
    floor_area_unit: &[
        "propertyOverviewData.propertyInfo.builtUp.unit",
        "listingData.property.sizeUnit",
        "listingData.sizeUnit",
    ],
    land_area: &[
        "propertyOverviewData.propertyInfo.landArea.size",
        "propertyOverviewData.propertyInfo.landAreaSqft",
        "listingData.landArea",
        "listingData.property.landArea",
    ],
    tenure: &[
        "propertyOverviewData.propertyInfo.tenure",
        "listingData.property.tenure",
        "listingData.tenure",
    ],
    property_title: &[
        "propertyOverviewData.propertyInfo.titleType",
        "listingData.property.titleType",
        "listingData.property.title",
    ],
    bumi_lot: &[
        "propertyOverviewData.propertyInfo.bumiLot",
        "listingData.property.bumiLot",
    ],
    total_units: &[
        "propertyOverviewData.propertyInfo.totalUnits",
        "listingData.property.totalUnits",
    ],
    completion_year: &[
        "propertyOverviewData.propertyInfo.completedYear",
        "propertyOverviewData.propertyInfo.completionYear",
        "listingData.property.completedYear",
        "listingData.property.yearBuilt",
    ],
    developer: &[
        "propertyOverviewData.propertyInfo.developer",
        "listingData.property.developer",
    ],
    rent_sale: &[
        "listingData.listingType",
        "listingData.purpose",
        "listingData.transactionType",
    ],
    furnishing_strict: &[
        "propertyOverviewData.propertyInfo.furnishing",
        "listingData.property.furnishing",
        "listingData.furnishing",
        "listingDetail.attributes.furnishing",
    ],
};

/// List-page schema for the primary portal.
pub static PROPERTYGURU_LIST: ListSchema = ListSchema {
    domain: "https://www.propertyguru.com.my",
    items: &[
        "listingsData.listings",
        "listingsData.items",
        "searchData.listings",
    ],
    url: &["listingData.url", "url", "shareLink"],
    title: &[
        "listingData.localizedTitle",
        "listingData.title",
        "localizedTitle",
        "title",
    ],
    updated: &[
        "listingData.updatedAt",
        "listingData.lastPostedDate.unix",
        "updatedAt",
        "lastPostedDate.unix",
    ],
    listed: &[
        "listingData.postedAt",
        "listingData.firstPostedDate.unix",
        "createdAt",
        "firstPostedDate.unix",
    ],
    agent_name: &["listingData.agent.name", "agent.name"],
    agent_id: &["listingData.agent.id", "agent.id", "agentId"],
    listing_id: &[
        "listingData.adId",
        "listingData.id",
        "listingData.listingId",
        "adId",
        "id",
        "listingId",
    ],
};
