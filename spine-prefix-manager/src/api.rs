//
// Copyright (c) The Spine Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use spine_utils::prefix::{PrefixEntry, PrefixType};
use spine_utils::{Responder, Sender};
use tokio::sync::oneshot;

// Client -> instance requests.
#[derive(Debug, Deserialize, Serialize)]
pub enum Request {
    // Request to advertise prefix entries.
    Advertise(AdvertiseRequest),
    // Request to withdraw prefix entries.
    Withdraw(WithdrawRequest),
    // Request to withdraw all entries of one client type.
    WithdrawByType(WithdrawByTypeRequest),
    // Request to replace all entries of one client type.
    SyncByType(SyncByTypeRequest),
    // Request to get all advertised entries.
    GetPrefixes(GetPrefixesRequest),
    // Request to get advertised routes, filtered, with the winner marked.
    GetAdvertisedRoutes(GetAdvertisedRoutesRequest),
    // Request to get per-area advertised or withheld routes.
    GetAreaAdvertisedRoutes(GetAreaAdvertisedRoutesRequest),
    // Request to get the state of all originated prefixes.
    GetOriginatedPrefixes(GetOriginatedPrefixesRequest),
    // Request to get the inbound message statistics.
    GetStatistics(GetStatisticsRequest),
}

// Failure answered to a control request.
#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RequestError {
    // The instance shut down before the request was served.
    InstanceShutdown,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AdvertiseRequest {
    pub entries: Vec<PrefixEntry>,
    #[serde(skip)]
    pub responder: Option<Responder<Result<bool, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WithdrawRequest {
    pub prefixes: Vec<(IpNetwork, PrefixType)>,
    #[serde(skip)]
    pub responder: Option<Responder<Result<bool, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WithdrawByTypeRequest {
    pub prefix_type: PrefixType,
    #[serde(skip)]
    pub responder: Option<Responder<Result<bool, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SyncByTypeRequest {
    pub prefix_type: PrefixType,
    pub entries: Vec<PrefixEntry>,
    #[serde(skip)]
    pub responder: Option<Responder<Result<bool, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetPrefixesRequest {
    pub prefix_type: Option<PrefixType>,
    #[serde(skip)]
    pub responder:
        Option<Responder<Result<Vec<PrefixEntry>, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetAdvertisedRoutesRequest {
    pub filter: RouteFilter,
    #[serde(skip)]
    pub responder: Option<
        Responder<Result<Vec<AdvertisedRouteDetail>, RequestError>>,
    >,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetAreaAdvertisedRoutesRequest {
    pub area: String,
    pub filter_type: RouteFilterType,
    pub filter: RouteFilter,
    #[serde(skip)]
    pub responder:
        Option<Responder<Result<Vec<AreaAdvertisedRoute>, RequestError>>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetOriginatedPrefixesRequest {
    #[serde(skip)]
    pub responder: Option<
        Responder<Result<Vec<OriginatedPrefixStatus>, RequestError>>,
    >,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct GetStatisticsRequest {
    #[serde(skip)]
    pub responder:
        Option<Responder<Result<StatisticsSnapshot, RequestError>>>,
}

// Inspection filter over advertised routes.
#[derive(Clone, Debug, Default)]
#[derive(Deserialize, Serialize)]
pub struct RouteFilter {
    pub prefixes: Option<BTreeSet<IpNetwork>>,
    pub prefix_type: Option<PrefixType>,
    pub area: Option<String>,
}

// Selects routes published into an area vs held back by label gating.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum RouteFilterType {
    Advertised,
    Withheld,
}

// All client entries of one prefix, winner first.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AdvertisedRouteDetail {
    pub prefix: IpNetwork,
    pub best: PrefixType,
    pub routes: Vec<PrefixEntry>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AreaAdvertisedRoute {
    pub prefix: IpNetwork,
    pub entry: PrefixEntry,
}

// Snapshot of the instance's inbound message counters.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct StatisticsSnapshot {
    pub discontinuity_time: Option<DateTime<Utc>>,
    pub route_updates_rcvd: u32,
    pub label_updates_rcvd: u32,
    pub key_changes_rcvd: u32,
    pub publications_sent: u32,
}

// Snapshot of one originated prefix.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct OriginatedPrefixStatus {
    pub prefix: IpNetwork,
    pub installed: bool,
    pub supporting: Vec<String>,
    pub minimum_supporting_routes: usize,
    pub install_to_fib: bool,
}

// ===== impl RouteFilter =====

impl RouteFilter {
    pub fn matches(
        &self,
        prefix: &IpNetwork,
        prefix_type: PrefixType,
        dst_areas: &BTreeSet<String>,
    ) -> bool {
        if let Some(prefixes) = &self.prefixes
            && !prefixes.contains(prefix)
        {
            return false;
        }
        if let Some(filter_type) = self.prefix_type
            && filter_type != prefix_type
        {
            return false;
        }
        if let Some(area) = &self.area
            && !dst_areas.contains(area)
        {
            return false;
        }
        true
    }
}

// ===== client helper functions =====

async fn request<T, F>(
    api_tx: &Sender<Request>,
    build: F,
) -> Result<T, RequestError>
where
    F: FnOnce(Responder<Result<T, RequestError>>) -> Request,
{
    let (responder_tx, responder_rx) = oneshot::channel();
    api_tx
        .send(build(responder_tx))
        .await
        .map_err(|_| RequestError::InstanceShutdown)?;
    responder_rx
        .await
        .map_err(|_| RequestError::InstanceShutdown)?
}

pub async fn advertise(
    api_tx: &Sender<Request>,
    entries: Vec<PrefixEntry>,
) -> Result<bool, RequestError> {
    request(api_tx, |responder| {
        Request::Advertise(AdvertiseRequest {
            entries,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn withdraw(
    api_tx: &Sender<Request>,
    prefixes: Vec<(IpNetwork, PrefixType)>,
) -> Result<bool, RequestError> {
    request(api_tx, |responder| {
        Request::Withdraw(WithdrawRequest {
            prefixes,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn withdraw_by_type(
    api_tx: &Sender<Request>,
    prefix_type: PrefixType,
) -> Result<bool, RequestError> {
    request(api_tx, |responder| {
        Request::WithdrawByType(WithdrawByTypeRequest {
            prefix_type,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn sync_by_type(
    api_tx: &Sender<Request>,
    prefix_type: PrefixType,
    entries: Vec<PrefixEntry>,
) -> Result<bool, RequestError> {
    request(api_tx, |responder| {
        Request::SyncByType(SyncByTypeRequest {
            prefix_type,
            entries,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn get_prefixes(
    api_tx: &Sender<Request>,
    prefix_type: Option<PrefixType>,
) -> Result<Vec<PrefixEntry>, RequestError> {
    request(api_tx, |responder| {
        Request::GetPrefixes(GetPrefixesRequest {
            prefix_type,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn get_advertised_routes(
    api_tx: &Sender<Request>,
    filter: RouteFilter,
) -> Result<Vec<AdvertisedRouteDetail>, RequestError> {
    request(api_tx, |responder| {
        Request::GetAdvertisedRoutes(GetAdvertisedRoutesRequest {
            filter,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn get_area_advertised_routes(
    api_tx: &Sender<Request>,
    area: String,
    filter_type: RouteFilterType,
    filter: RouteFilter,
) -> Result<Vec<AreaAdvertisedRoute>, RequestError> {
    request(api_tx, |responder| {
        Request::GetAreaAdvertisedRoutes(GetAreaAdvertisedRoutesRequest {
            area,
            filter_type,
            filter,
            responder: Some(responder),
        })
    })
    .await
}

pub async fn get_originated_prefixes(
    api_tx: &Sender<Request>,
) -> Result<Vec<OriginatedPrefixStatus>, RequestError> {
    request(api_tx, |responder| {
        Request::GetOriginatedPrefixes(GetOriginatedPrefixesRequest {
            responder: Some(responder),
        })
    })
    .await
}

pub async fn get_statistics(
    api_tx: &Sender<Request>,
) -> Result<StatisticsSnapshot, RequestError> {
    request(api_tx, |responder| {
        Request::GetStatistics(GetStatisticsRequest {
            responder: Some(responder),
        })
    })
    .await
}
