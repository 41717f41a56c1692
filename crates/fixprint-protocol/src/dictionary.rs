use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use fixprint_types::TypeRegistry;

/// Value type of a field, used to validate decoded values
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    String,
    Char,
    Int,
    Float,
    Boolean,
    UtcTimestamp,
}

/// Which part of a message a field belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldLocation {
    Header,
    #[default]
    Body,
    Trailer,
}

/// Definition of a single tag
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub name: Arc<str>,
    pub kind: FieldType,
    pub location: FieldLocation,
    values: HashMap<String, Arc<str>>,
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldType, location: FieldLocation) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            location,
            values: HashMap::new(),
        }
    }

    /// Description of an enumerated value, e.g. "Buy" for Side=1
    pub fn describe(&self, value: &str) -> Option<&Arc<str>> {
        self.values.get(value)
    }
}

#[derive(Debug, Error)]
pub enum DictionaryError {
    #[error("could not read dictionary {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid dictionary {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("unsupported begin string '{0}'")]
    BeginString(String),
}

/// Protocol context: begin string, message types and field definitions
#[derive(Clone, Debug)]
pub struct Dictionary {
    begin_string: String,
    version: u32,
    messages: HashMap<String, Arc<str>>,
    fields: HashMap<u32, FieldDef>,
}

impl Dictionary {
    /// Built-in FIX 4.2 dictionary
    pub fn fix42() -> Self {
        let messages = FIX42_MESSAGES
            .iter()
            .map(|(tag, name)| (tag.to_string(), Arc::from(*name)))
            .collect();

        let mut fields: HashMap<u32, FieldDef> = FIX42_FIELDS
            .iter()
            .map(|&(tag, name, kind, location)| (tag, FieldDef::new(name, kind, location)))
            .collect();

        for &(tag, value, description) in FIX42_VALUES {
            if let Some(def) = fields.get_mut(&tag) {
                def.values.insert(value.to_string(), Arc::from(description));
            }
        }

        Self {
            begin_string: "FIX.4.2".to_string(),
            version: 4200,
            messages,
            fields,
        }
    }

    pub fn begin_string(&self) -> &str {
        &self.begin_string
    }

    /// Numeric protocol version, e.g. 4200 for FIX.4.2
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn message_name(&self, msg_type: &str) -> Option<&Arc<str>> {
        self.messages.get(msg_type)
    }

    pub fn field(&self, tag: u32) -> Option<&FieldDef> {
        self.fields.get(&tag)
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Load a TOML overlay file and merge it into this dictionary
    pub fn load_overlay(&mut self, path: &Path) -> Result<(), DictionaryError> {
        let content = std::fs::read_to_string(path).map_err(|source| DictionaryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let overlay: DictionaryOverlay =
            toml::from_str(&content).map_err(|source| DictionaryError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        self.apply(overlay)
    }

    /// Merge an overlay, replacing existing entries with the same key
    pub fn apply(&mut self, overlay: DictionaryOverlay) -> Result<(), DictionaryError> {
        if let Some(begin_string) = overlay.begin_string {
            self.version = parse_version(&begin_string)
                .ok_or_else(|| DictionaryError::BeginString(begin_string.clone()))?;
            self.begin_string = begin_string;
        }

        for (msg_type, name) in overlay.messages {
            self.messages.insert(msg_type, Arc::from(name));
        }

        for field in overlay.fields {
            let mut def = FieldDef::new(&field.name, field.kind, field.location);
            def.values = field
                .values
                .into_iter()
                .map(|(value, description)| (value, Arc::from(description)))
                .collect();
            tracing::debug!(tag = field.tag, name = %field.name, "dictionary field override");
            self.fields.insert(field.tag, def);
        }

        Ok(())
    }
}

impl Default for Dictionary {
    fn default() -> Self {
        Self::fix42()
    }
}

impl TypeRegistry for Dictionary {
    fn display_name(&self, tag: &str) -> Option<&str> {
        self.messages.get(tag).map(|name| &**name)
    }
}

/// Additions to the built-in dictionary, read from TOML
///
/// ```toml
/// begin_string = "FIX.4.4"
///
/// [messages]
/// U1 = "StrategyOrder"
///
/// [[fields]]
/// tag = 5001
/// name = "StrategyTag"
/// type = "int"
///
/// [fields.values]
/// 1 = "Twap"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DictionaryOverlay {
    pub begin_string: Option<String>,

    #[serde(default)]
    pub messages: BTreeMap<String, String>,

    #[serde(default)]
    pub fields: Vec<FieldOverlay>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldOverlay {
    pub tag: u32,
    pub name: String,

    #[serde(default, rename = "type")]
    pub kind: FieldType,

    #[serde(default)]
    pub location: FieldLocation,

    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// "FIX.4.4" -> 4400, "FIXT.1.1" -> 1100
fn parse_version(begin_string: &str) -> Option<u32> {
    let numbers = begin_string
        .strip_prefix("FIXT.")
        .or_else(|| begin_string.strip_prefix("FIX."))?;
    let (major, minor) = numbers.split_once('.')?;
    let major: u32 = major.parse().ok()?;
    let minor: u32 = minor.parse().ok()?;
    if major > 9 || minor > 9 {
        return None;
    }
    Some(major * 1000 + minor * 100)
}

// ============================================================================
// FIX 4.2 tables
// ============================================================================

const FIX42_MESSAGES: &[(&str, &str)] = &[
    ("0", "Heartbeat"),
    ("1", "TestRequest"),
    ("2", "ResendRequest"),
    ("3", "Reject"),
    ("4", "SequenceReset"),
    ("5", "Logout"),
    ("6", "IOI"),
    ("7", "Advertisement"),
    ("8", "ExecutionReport"),
    ("9", "OrderCancelReject"),
    ("A", "Logon"),
    ("B", "News"),
    ("C", "Email"),
    ("D", "NewOrderSingle"),
    ("E", "NewOrderList"),
    ("F", "OrderCancelRequest"),
    ("G", "OrderCancelReplaceRequest"),
    ("H", "OrderStatusRequest"),
    ("J", "Allocation"),
    ("K", "ListCancelRequest"),
    ("L", "ListExecute"),
    ("M", "ListStatusRequest"),
    ("N", "ListStatus"),
    ("P", "AllocationInstructionAck"),
    ("Q", "DontKnowTrade"),
    ("R", "QuoteRequest"),
    ("S", "Quote"),
    ("T", "SettlementInstructions"),
    ("V", "MarketDataRequest"),
    ("W", "MarketDataSnapshotFullRefresh"),
    ("X", "MarketDataIncrementalRefresh"),
    ("Y", "MarketDataRequestReject"),
    ("Z", "QuoteCancel"),
    ("a", "QuoteStatusRequest"),
    ("b", "QuoteAcknowledgement"),
    ("c", "SecurityDefinitionRequest"),
    ("d", "SecurityDefinition"),
    ("e", "SecurityStatusRequest"),
    ("f", "SecurityStatus"),
    ("g", "TradingSessionStatusRequest"),
    ("h", "TradingSessionStatus"),
    ("i", "MassQuote"),
    ("j", "BusinessMessageReject"),
    ("k", "BidRequest"),
    ("l", "BidResponse"),
    ("m", "ListStrikePrice"),
];

use FieldLocation::{Body, Header, Trailer};
use FieldType::{Boolean, Char, Float, Int, String as Str, UtcTimestamp};

const FIX42_FIELDS: &[(u32, &str, FieldType, FieldLocation)] = &[
    // Standard header
    (8, "BeginString", Str, Header),
    (9, "BodyLength", Int, Header),
    (35, "MsgType", Str, Header),
    (49, "SenderCompID", Str, Header),
    (56, "TargetCompID", Str, Header),
    (115, "OnBehalfOfCompID", Str, Header),
    (128, "DeliverToCompID", Str, Header),
    (90, "SecureDataLen", Int, Header),
    (91, "SecureData", Str, Header),
    (34, "MsgSeqNum", Int, Header),
    (50, "SenderSubID", Str, Header),
    (142, "SenderLocationID", Str, Header),
    (57, "TargetSubID", Str, Header),
    (143, "TargetLocationID", Str, Header),
    (116, "OnBehalfOfSubID", Str, Header),
    (144, "OnBehalfOfLocationID", Str, Header),
    (129, "DeliverToSubID", Str, Header),
    (145, "DeliverToLocationID", Str, Header),
    (43, "PossDupFlag", Boolean, Header),
    (97, "PossResend", Boolean, Header),
    (52, "SendingTime", UtcTimestamp, Header),
    (122, "OrigSendingTime", UtcTimestamp, Header),
    (212, "XmlDataLen", Int, Header),
    (213, "XmlData", Str, Header),
    (347, "MessageEncoding", Str, Header),
    (369, "LastMsgSeqNumProcessed", Int, Header),
    (370, "OnBehalfOfSendingTime", UtcTimestamp, Header),
    // Standard trailer
    (93, "SignatureLength", Int, Trailer),
    (89, "Signature", Str, Trailer),
    (10, "CheckSum", Str, Trailer),
    // Session level
    (7, "BeginSeqNo", Int, Body),
    (16, "EndSeqNo", Int, Body),
    (36, "NewSeqNo", Int, Body),
    (45, "RefSeqNum", Int, Body),
    (58, "Text", Str, Body),
    (98, "EncryptMethod", Int, Body),
    (108, "HeartBtInt", Int, Body),
    (112, "TestReqID", Str, Body),
    (123, "GapFillFlag", Boolean, Body),
    (141, "ResetSeqNumFlag", Boolean, Body),
    (371, "RefTagID", Int, Body),
    (372, "RefMsgType", Str, Body),
    (373, "SessionRejectReason", Int, Body),
    (379, "BusinessRejectRefID", Str, Body),
    (380, "BusinessRejectReason", Int, Body),
    (383, "MaxMessageSize", Int, Body),
    // Orders and executions
    (1, "Account", Str, Body),
    (6, "AvgPx", Float, Body),
    (11, "ClOrdID", Str, Body),
    (14, "CumQty", Float, Body),
    (15, "Currency", Str, Body),
    (17, "ExecID", Str, Body),
    (18, "ExecInst", Str, Body),
    (19, "ExecRefID", Str, Body),
    (20, "ExecTransType", Char, Body),
    (21, "HandlInst", Char, Body),
    (22, "IDSource", Str, Body),
    (31, "LastPx", Float, Body),
    (32, "LastShares", Float, Body),
    (37, "OrderID", Str, Body),
    (38, "OrderQty", Float, Body),
    (39, "OrdStatus", Char, Body),
    (40, "OrdType", Char, Body),
    (41, "OrigClOrdID", Str, Body),
    (44, "Price", Float, Body),
    (47, "Rule80A", Char, Body),
    (48, "SecurityID", Str, Body),
    (54, "Side", Char, Body),
    (55, "Symbol", Str, Body),
    (59, "TimeInForce", Char, Body),
    (60, "TransactTime", UtcTimestamp, Body),
    (63, "SettlmntTyp", Char, Body),
    (64, "FutSettDate", Str, Body),
    (65, "SymbolSfx", Str, Body),
    (66, "ListID", Str, Body),
    (99, "StopPx", Float, Body),
    (100, "ExDestination", Str, Body),
    (102, "CxlRejReason", Int, Body),
    (103, "OrdRejReason", Int, Body),
    (109, "ClientID", Str, Body),
    (110, "MinQty", Float, Body),
    (111, "MaxFloor", Float, Body),
    (126, "ExpireTime", UtcTimestamp, Body),
    (150, "ExecType", Char, Body),
    (151, "LeavesQty", Float, Body),
    (152, "CashOrderQty", Float, Body),
    (167, "SecurityType", Str, Body),
    (207, "SecurityExchange", Str, Body),
    (434, "CxlRejResponseTo", Char, Body),
    // Quotes and market data
    (117, "QuoteID", Str, Body),
    (131, "QuoteReqID", Str, Body),
    (132, "BidPx", Float, Body),
    (133, "OfferPx", Float, Body),
    (134, "BidSize", Float, Body),
    (135, "OfferSize", Float, Body),
    (146, "NoRelatedSym", Int, Body),
    (262, "MDReqID", Str, Body),
    (263, "SubscriptionRequestType", Char, Body),
    (264, "MarketDepth", Int, Body),
    (265, "MDUpdateType", Int, Body),
    (267, "NoMDEntryTypes", Int, Body),
    (268, "NoMDEntries", Int, Body),
    (269, "MDEntryType", Char, Body),
    (270, "MDEntryPx", Float, Body),
    (271, "MDEntrySize", Float, Body),
    (279, "MDUpdateAction", Char, Body),
    (281, "MDReqRejReason", Char, Body),
];

const FIX42_VALUES: &[(u32, &str, &str)] = &[
    (54, "1", "Buy"),
    (54, "2", "Sell"),
    (54, "3", "BuyMinus"),
    (54, "4", "SellPlus"),
    (54, "5", "SellShort"),
    (54, "6", "SellShortExempt"),
    (54, "7", "Undisclosed"),
    (54, "8", "Cross"),
    (54, "9", "CrossShort"),
    (40, "1", "Market"),
    (40, "2", "Limit"),
    (40, "3", "Stop"),
    (40, "4", "StopLimit"),
    (40, "5", "MarketOnClose"),
    (40, "P", "Pegged"),
    (39, "0", "New"),
    (39, "1", "PartiallyFilled"),
    (39, "2", "Filled"),
    (39, "3", "DoneForDay"),
    (39, "4", "Canceled"),
    (39, "5", "Replaced"),
    (39, "6", "PendingCancel"),
    (39, "7", "Stopped"),
    (39, "8", "Rejected"),
    (39, "9", "Suspended"),
    (39, "A", "PendingNew"),
    (39, "B", "Calculated"),
    (39, "C", "Expired"),
    (39, "D", "AcceptedForBidding"),
    (39, "E", "PendingReplace"),
    (150, "0", "New"),
    (150, "1", "PartialFill"),
    (150, "2", "Fill"),
    (150, "3", "DoneForDay"),
    (150, "4", "Canceled"),
    (150, "5", "Replace"),
    (150, "6", "PendingCancel"),
    (150, "7", "Stopped"),
    (150, "8", "Rejected"),
    (150, "9", "Suspended"),
    (150, "A", "PendingNew"),
    (150, "B", "Calculated"),
    (150, "C", "Expired"),
    (150, "D", "Restated"),
    (150, "E", "PendingReplace"),
    (59, "0", "Day"),
    (59, "1", "GoodTillCancel"),
    (59, "2", "AtTheOpening"),
    (59, "3", "ImmediateOrCancel"),
    (59, "4", "FillOrKill"),
    (59, "5", "GoodTillCrossing"),
    (59, "6", "GoodTillDate"),
    (21, "1", "AutomatedExecutionNoIntervention"),
    (21, "2", "AutomatedExecutionInterventionOK"),
    (21, "3", "ManualOrder"),
    (98, "0", "None"),
];
