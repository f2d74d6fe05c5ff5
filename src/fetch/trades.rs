use roxmltree::Node;

use crate::error::AppError;

use super::decode::{self, field, find_text, text_or_empty};
use super::normalize::{contract_date, normalize_amount, normalize_date};
use super::FetchResult;

const DONG_TAGS: &[&str] = &["aptDong", "단지동", "동", "apt_dong"];
const DEAL_TYPE_TAGS: &[&str] = &["tradeType", "거래유형", "dealType", "dealingGbn"];
const BROKER_TAGS: &[&str] = &[
    "bcnstAddr",
    "brokerAddr",
    "중개사소재지",
    "bcnstc",
    "estateAgentSggNm",
];
const REGISTRATION_TAGS: &[&str] = &["registDay", "등기일자", "registrationDate", "rgstDate"];
const SELLER_TAGS: &[&str] = &[
    "seller",
    "거래주체정보_매도자",
    "매도자",
    "tradePartSeller",
    "slerGbn",
];
const BUYER_TAGS: &[&str] = &["buyer", "거래주체정보_매수자", "매수자", "tradePartBuyer"];
const LAND_LEASE_TAGS: &[&str] = &["rentYn", "토지임대부", "landLease", "isLandLeaseApt"];

pub const JEONSE: &str = "전세";
pub const WOLSE: &str = "월세";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeKind {
    Sale,
    Rent,
}

impl TradeKind {
    pub fn label(self) -> &'static str {
        match self {
            TradeKind::Sale => "sale",
            TradeKind::Rent => "rent",
        }
    }
}

/// One apartment sale as published by the trade endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleRecord {
    pub apartment: String,
    pub building_dong: String,
    pub area: String,
    pub contract_date: String,
    pub amount: String,
    pub floor: String,
    pub build_year: String,
    pub legal_dong: String,
    pub lot_number: String,
    pub region_code: String,
    pub deal_type: String,
    pub broker_location: String,
    pub registration_date: String,
    pub seller: String,
    pub buyer: String,
    pub land_lease: String,
}

/// One lease contract; shares the sale fields and adds the deposit terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentRecord {
    pub base: SaleRecord,
    pub deposit: String,
    pub monthly_rent: String,
    pub contract_term: String,
    pub contract_type: String,
    pub renewal_right: String,
    pub previous_deposit: String,
    pub previous_monthly_rent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeRecord {
    Sale(SaleRecord),
    Rent(RentRecord),
}

/// Display columns shared by sale and rent rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Column {
    Apartment,
    BuildingDong,
    Area,
    ContractDate,
    Amount,
    Floor,
    BuildYear,
    LegalDong,
    LotNumber,
    RegionCode,
    DealType,
    BrokerLocation,
    RegistrationDate,
    Seller,
    Buyer,
    LandLease,
    Deposit,
    MonthlyRent,
    ContractTerm,
    ContractType,
    RenewalRight,
    PreviousDeposit,
    PreviousMonthlyRent,
}

impl Column {
    pub const ALL: [Column; 23] = [
        Column::Apartment,
        Column::BuildingDong,
        Column::Area,
        Column::ContractDate,
        Column::Amount,
        Column::Floor,
        Column::BuildYear,
        Column::LegalDong,
        Column::LotNumber,
        Column::RegionCode,
        Column::DealType,
        Column::BrokerLocation,
        Column::RegistrationDate,
        Column::Seller,
        Column::Buyer,
        Column::LandLease,
        Column::Deposit,
        Column::MonthlyRent,
        Column::ContractTerm,
        Column::ContractType,
        Column::RenewalRight,
        Column::PreviousDeposit,
        Column::PreviousMonthlyRent,
    ];

    /// Columns shown when no rent rows are present.
    pub const SALE: [Column; 16] = [
        Column::Apartment,
        Column::BuildingDong,
        Column::Area,
        Column::ContractDate,
        Column::Amount,
        Column::Floor,
        Column::BuildYear,
        Column::LegalDong,
        Column::LotNumber,
        Column::RegionCode,
        Column::DealType,
        Column::BrokerLocation,
        Column::RegistrationDate,
        Column::Seller,
        Column::Buyer,
        Column::LandLease,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::Apartment => "아파트명",
            Column::BuildingDong => "아파트동",
            Column::Area => "전용면적",
            Column::ContractDate => "계약일",
            Column::Amount => "거래금액(만원)",
            Column::Floor => "층",
            Column::BuildYear => "건축년도",
            Column::LegalDong => "법정동",
            Column::LotNumber => "지번",
            Column::RegionCode => "지역코드",
            Column::DealType => "거래유형",
            Column::BrokerLocation => "중개사소재지",
            Column::RegistrationDate => "등기일자",
            Column::Seller => "거래주체_매도자",
            Column::Buyer => "거래주체_매수자",
            Column::LandLease => "토지임대부여부",
            Column::Deposit => "보증금(만원)",
            Column::MonthlyRent => "월세(만원)",
            Column::ContractTerm => "계약기간",
            Column::ContractType => "계약구분",
            Column::RenewalRight => "갱신요구권사용",
            Column::PreviousDeposit => "종전보증금",
            Column::PreviousMonthlyRent => "종전월세",
        }
    }

    /// Columns compared as numbers when sorting.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Column::Amount
                | Column::MonthlyRent
                | Column::Deposit
                | Column::Area
                | Column::Floor
                | Column::BuildYear
        )
    }
}

impl SaleRecord {
    fn cell(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Apartment => &self.apartment,
            Column::BuildingDong => &self.building_dong,
            Column::Area => &self.area,
            Column::ContractDate => &self.contract_date,
            Column::Amount => &self.amount,
            Column::Floor => &self.floor,
            Column::BuildYear => &self.build_year,
            Column::LegalDong => &self.legal_dong,
            Column::LotNumber => &self.lot_number,
            Column::RegionCode => &self.region_code,
            Column::DealType => &self.deal_type,
            Column::BrokerLocation => &self.broker_location,
            Column::RegistrationDate => &self.registration_date,
            Column::Seller => &self.seller,
            Column::Buyer => &self.buyer,
            Column::LandLease => &self.land_lease,
            _ => return None,
        };
        Some(value.as_str())
    }
}

impl RentRecord {
    fn rent_cell(&self, column: Column) -> &str {
        let value = match column {
            Column::Deposit => &self.deposit,
            Column::MonthlyRent => &self.monthly_rent,
            Column::ContractTerm => &self.contract_term,
            Column::ContractType => &self.contract_type,
            Column::RenewalRight => &self.renewal_right,
            Column::PreviousDeposit => &self.previous_deposit,
            Column::PreviousMonthlyRent => &self.previous_monthly_rent,
            _ => return "",
        };
        value.as_str()
    }
}

impl TradeRecord {
    pub fn kind(&self) -> TradeKind {
        match self {
            TradeRecord::Sale(_) => TradeKind::Sale,
            TradeRecord::Rent(_) => TradeKind::Rent,
        }
    }

    pub fn base(&self) -> &SaleRecord {
        match self {
            TradeRecord::Sale(sale) => sale,
            TradeRecord::Rent(rent) => &rent.base,
        }
    }

    /// Cell text for `column`; sale rows project empty rent-only columns.
    pub fn cell(&self, column: Column) -> &str {
        match self {
            TradeRecord::Sale(sale) => sale.cell(column).unwrap_or(""),
            TradeRecord::Rent(rent) => match rent.base.cell(column) {
                Some(value) => value,
                None => rent.rent_cell(column),
            },
        }
    }

    pub fn to_row(&self, columns: &[Column]) -> Vec<String> {
        columns.iter().map(|c| self.cell(*c).to_string()).collect()
    }
}

/// Decoded content of one response page.
#[derive(Debug, Clone, Default)]
pub struct TradePage {
    pub items: Vec<TradeRecord>,
    pub item_count: usize,
    pub result_code: Option<String>,
    pub result_msg: Option<String>,
    pub total_count: Option<usize>,
}

pub fn parse_page(kind: TradeKind, xml: &str) -> FetchResult<TradePage> {
    match kind {
        TradeKind::Sale => parse_trade_page(xml),
        TradeKind::Rent => parse_rent_page(xml),
    }
}

pub fn parse_trade_page(xml: &str) -> FetchResult<TradePage> {
    parse_with(xml, |item| TradeRecord::Sale(sale_from_item(item)))
}

pub fn parse_rent_page(xml: &str) -> FetchResult<TradePage> {
    parse_with(xml, |item| TradeRecord::Rent(rent_from_item(item)))
}

fn parse_with(xml: &str, build: impl Fn(Node<'_, '_>) -> TradeRecord) -> FetchResult<TradePage> {
    let doc = decode::parse_document(xml)?;
    let envelope = decode::envelope(&doc);
    let items: Vec<TradeRecord> = decode::items(&doc).into_iter().map(build).collect();

    if envelope.is_error() && items.is_empty() {
        return Err(AppError::api(
            envelope.result_code.unwrap_or_default(),
            envelope.result_msg.unwrap_or_default(),
        ));
    }

    Ok(TradePage {
        item_count: items.len(),
        items,
        result_code: envelope.result_code,
        result_msg: envelope.result_msg,
        total_count: envelope.total_count,
    })
}

fn sale_from_item(item: Node<'_, '_>) -> SaleRecord {
    SaleRecord {
        apartment: text_or_empty(item, "aptNm"),
        building_dong: field(item, "aptDong", DONG_TAGS),
        area: text_or_empty(item, "excluUseAr"),
        contract_date: contract_date(
            &text_or_empty(item, "dealYear"),
            &text_or_empty(item, "dealMonth"),
            &text_or_empty(item, "dealDay"),
        ),
        amount: normalize_amount(&text_or_empty(item, "dealAmount")),
        floor: text_or_empty(item, "floor"),
        build_year: text_or_empty(item, "buildYear"),
        legal_dong: text_or_empty(item, "umdNm"),
        lot_number: text_or_empty(item, "jibun"),
        region_code: text_or_empty(item, "sggCd"),
        deal_type: field(item, "dealingGbn", DEAL_TYPE_TAGS),
        broker_location: field(item, "estateAgentSggNm", BROKER_TAGS),
        registration_date: normalize_date(&field(item, "rgstDate", REGISTRATION_TAGS)),
        seller: field(item, "slerGbn", SELLER_TAGS),
        buyer: find_text(item, BUYER_TAGS),
        land_lease: find_text(item, LAND_LEASE_TAGS),
    }
}

fn rent_from_item(item: Node<'_, '_>) -> RentRecord {
    let mut base = sale_from_item(item);
    let monthly_rent = normalize_amount(&text_or_empty(item, "monthlyRent"));
    base.deal_type = if monthly_rent.is_empty() || monthly_rent.chars().all(|c| c == '0') {
        JEONSE.to_string()
    } else {
        WOLSE.to_string()
    };

    RentRecord {
        base,
        deposit: normalize_amount(&text_or_empty(item, "deposit")),
        monthly_rent,
        contract_term: text_or_empty(item, "contractTerm"),
        contract_type: text_or_empty(item, "contractType"),
        renewal_right: text_or_empty(item, "useRRRight"),
        previous_deposit: normalize_amount(&text_or_empty(item, "preDeposit")),
        previous_monthly_rent: normalize_amount(&text_or_empty(item, "preMonthlyRent")),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sale_item(name: &str, day: u32, amount: &str) -> String {
        format!(
            "<item><aptNm>{name}</aptNm><excluUseAr>84.9</excluUseAr><dealYear>2024</dealYear>\
             <dealMonth>1</dealMonth><dealDay>{day}</dealDay><dealAmount>{amount}</dealAmount>\
             <floor>7</floor><buildYear>2004</buildYear><umdNm>사직동</umdNm><jibun>9</jibun>\
             <sggCd>11110</sggCd><dealingGbn>중개거래</dealingGbn><rgstDate>24.02.01</rgstDate>\
             <buyerGbn>개인</buyerGbn></item>"
        )
    }

    pub(crate) fn page_xml(items: &[String]) -> String {
        format!(
            "<response><header><resultCode>000</resultCode><resultMsg>OK</resultMsg></header>\
             <body><items>{}</items><totalCount>{}</totalCount></body></response>",
            items.concat(),
            items.len()
        )
    }

    #[test]
    fn parses_sale_items_with_normalisation() {
        let xml = page_xml(&[sale_item("Hill", 5, " 12,500")]);
        let page = parse_trade_page(&xml).unwrap();
        assert_eq!(page.item_count, 1);
        let TradeRecord::Sale(sale) = &page.items[0] else {
            panic!("expected sale");
        };
        assert_eq!(sale.amount, "12500");
        assert_eq!(sale.contract_date, "2024-01-05");
        assert_eq!(sale.registration_date, "2024-02-01");
        assert_eq!(sale.buyer, "개인");
        assert_eq!(sale.building_dong, "");
    }

    #[test]
    fn rent_rows_derive_transaction_type() {
        let xml = page_xml(&[
            "<item><aptNm>A</aptNm><deposit>30,000</deposit><monthlyRent>0</monthlyRent></item>"
                .to_string(),
            "<item><aptNm>B</aptNm><deposit>5,000</deposit><monthlyRent>120</monthlyRent></item>"
                .to_string(),
        ]);
        let page = parse_rent_page(&xml).unwrap();
        assert_eq!(page.items[0].cell(Column::DealType), JEONSE);
        assert_eq!(page.items[0].cell(Column::Deposit), "30000");
        assert_eq!(page.items[1].cell(Column::DealType), WOLSE);
        assert_eq!(page.items[1].kind(), TradeKind::Rent);
    }

    #[test]
    fn sale_rows_project_empty_rent_columns() {
        let xml = page_xml(&[sale_item("Hill", 5, "1")]);
        let page = parse_trade_page(&xml).unwrap();
        let row = page.items[0].to_row(&Column::ALL);
        assert_eq!(row.len(), Column::ALL.len());
        assert_eq!(page.items[0].cell(Column::MonthlyRent), "");
    }

    #[test]
    fn error_header_without_items_is_api_error() {
        let xml = "<response><header><resultCode>30</resultCode>\
                   <resultMsg>SERVICE KEY IS NOT REGISTERED</resultMsg></header></response>";
        match parse_trade_page(xml) {
            Err(AppError::Api { code, message }) => {
                assert_eq!(code, "30");
                assert!(message.contains("SERVICE KEY"));
            }
            other => panic!("unexpected: {:?}", other.map(|p| p.item_count)),
        }
    }

    #[test]
    fn malformed_body_is_xml_error() {
        assert!(matches!(
            parse_trade_page("<html><body>"),
            Err(AppError::Xml(_))
        ));
    }
}
