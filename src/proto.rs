//! Hand-written protobuf messages for the ABCI query paths the sources use
//!
//! Only the handful of request/response shapes we actually send are defined
//! here; generating the full cosmos-sdk / cosmwasm protos would pull in a
//! build step for four query paths.
//!
//! Paths covered:
//! - `/cosmwasm.wasm.v1.Query/SmartContractState`
//! - `/cosmos.bank.v1beta1.Query/SupplyOf`
//! - `/cosmos.bank.v1beta1.Query/Balance`
//! - `/cosmos.bank.v1beta1.Query/DenomOwners`

/// cosmwasm.wasm.v1.QuerySmartContractStateRequest
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuerySmartContractStateRequest {
    #[prost(string, tag = "1")]
    pub address: String,
    /// JSON-encoded query message, as the contract expects it
    #[prost(bytes = "vec", tag = "2")]
    pub query_data: Vec<u8>,
}

/// cosmwasm.wasm.v1.QuerySmartContractStateResponse
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuerySmartContractStateResponse {
    /// JSON-encoded contract response
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// cosmos.base.v1beta1.Coin
#[derive(Clone, PartialEq, prost::Message)]
pub struct Coin {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// cosmos.bank.v1beta1.QuerySupplyOfRequest
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuerySupplyOfRequest {
    #[prost(string, tag = "1")]
    pub denom: String,
}

/// cosmos.bank.v1beta1.QuerySupplyOfResponse
#[derive(Clone, PartialEq, prost::Message)]
pub struct QuerySupplyOfResponse {
    #[prost(message, optional, tag = "1")]
    pub amount: Option<Coin>,
}

/// cosmos.bank.v1beta1.QueryBalanceRequest
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryBalanceRequest {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(string, tag = "2")]
    pub denom: String,
}

/// cosmos.bank.v1beta1.QueryBalanceResponse
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryBalanceResponse {
    #[prost(message, optional, tag = "1")]
    pub balance: Option<Coin>,
}

/// cosmos.base.query.v1beta1.PageRequest
#[derive(Clone, PartialEq, prost::Message)]
pub struct PageRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub offset: u64,
    #[prost(uint64, tag = "3")]
    pub limit: u64,
    #[prost(bool, tag = "4")]
    pub count_total: bool,
    #[prost(bool, tag = "5")]
    pub reverse: bool,
}

/// cosmos.base.query.v1beta1.PageResponse
#[derive(Clone, PartialEq, prost::Message)]
pub struct PageResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub next_key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub total: u64,
}

/// cosmos.bank.v1beta1.QueryDenomOwnersRequest
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryDenomOwnersRequest {
    #[prost(string, tag = "1")]
    pub denom: String,
    #[prost(message, optional, tag = "2")]
    pub pagination: Option<PageRequest>,
}

/// cosmos.bank.v1beta1.DenomOwner
#[derive(Clone, PartialEq, prost::Message)]
pub struct DenomOwner {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, optional, tag = "2")]
    pub balance: Option<Coin>,
}

/// cosmos.bank.v1beta1.QueryDenomOwnersResponse
#[derive(Clone, PartialEq, prost::Message)]
pub struct QueryDenomOwnersResponse {
    #[prost(message, repeated, tag = "1")]
    pub denom_owners: Vec<DenomOwner>,
    #[prost(message, optional, tag = "2")]
    pub pagination: Option<PageResponse>,
}
