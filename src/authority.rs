//! Hickory DNS authorities backed by the container registry.
//!
//! Two authorities share one [`Registry`]: [`DiscoAuthority`] serves the
//! configured zone (SOA, NS and A records) and [`ReverseAuthority`] serves
//! PTR lookups under `in-addr.arpa`.

use async_trait::async_trait;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, NS, PTR};
use hickory_proto::rr::{LowerName, Name, RData, Record, RecordSet, RecordType};
use hickory_server::authority::{
    Authority, LookupControlFlow, LookupError, LookupOptions, LookupRecords, UpdateResult,
    ZoneType,
};
use hickory_server::server::{Request, RequestInfo};
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::error::DiscoError;
use crate::metrics::{self, QueryResult, Timer};
use crate::registry::{Registry, REV_TLD};

/// Authority for the discovery zone.
pub struct DiscoAuthority {
    origin: LowerName,
    registry: Arc<Registry>,
}

impl DiscoAuthority {
    /// Create an authority rooted at the registry's TLD.
    pub fn new(registry: Arc<Registry>) -> Result<Self, DiscoError> {
        let origin = registry.name(None)?.into();

        Ok(Self { origin, registry })
    }

    /// Build A records for the given name and addresses. IPv6 candidates
    /// never reach this point; the registry only advertises IPv4.
    fn build_a_records(&self, name: Name, addrs: &[IpAddr]) -> RecordSet {
        let ttl = self.registry.res_ttl();
        let mut record_set = RecordSet::new(name.clone(), RecordType::A, 0);

        for addr in addrs {
            if let IpAddr::V4(v4) = addr {
                let mut record = Record::from_rdata(name.clone(), ttl, RData::A(A::from(*v4)));
                record.set_dns_class(hickory_proto::rr::DNSClass::IN);
                record_set.insert(record, 0);
            }
        }

        record_set
    }

    /// Build the SOA record for the zone apex.
    fn build_soa_record(&self) -> Result<RecordSet, LookupError> {
        let soa = self
            .registry
            .soa()
            .map_err(|e| LookupError::from(io::Error::other(e.to_string())))?;

        let name = Name::from(self.origin.clone());
        let mut record_set = RecordSet::new(name.clone(), RecordType::SOA, 0);
        let mut record = Record::from_rdata(name, self.registry.res_ttl(), RData::SOA(soa));
        record.set_dns_class(hickory_proto::rr::DNSClass::IN);
        record_set.insert(record, 0);

        Ok(record_set)
    }

    /// Build the NS record for the zone apex.
    fn build_ns_record(&self) -> Result<RecordSet, LookupError> {
        let ns_name = self
            .registry
            .zone_master()
            .map_err(|e| LookupError::from(io::Error::other(e.to_string())))?;

        let name = Name::from(self.origin.clone());
        let mut record_set = RecordSet::new(name.clone(), RecordType::NS, 0);
        let mut record =
            Record::from_rdata(name, self.registry.res_ttl(), RData::NS(NS(ns_name)));
        record.set_dns_class(hickory_proto::rr::DNSClass::IN);
        record_set.insert(record, 0);

        Ok(record_set)
    }

    fn lookup_a(
        &self,
        name: &LowerName,
        lookup_options: LookupOptions,
    ) -> Result<LookupRecords, LookupError> {
        let name_str = name.to_string();
        let lookup_name = name_str.trim_end_matches('.');
        let postfix = format!(".{}", self.registry.tld());

        if !lookup_name.ends_with(&postfix) {
            return Err(LookupError::ResponseCode(ResponseCode::NXDomain));
        }

        let master = self
            .registry
            .zone_master()
            .map_err(|e| LookupError::from(io::Error::other(e.to_string())))?;

        if Name::from(name.clone()) == master {
            // the nameserver's own address must resolve or the zone is broken;
            // Refused is the only hard code the catalog passes through unchanged
            let Some(addr) = self.registry.advertise_addr() else {
                warn!("unable to determine address advertisement");
                return Err(LookupError::ResponseCode(ResponseCode::Refused));
            };

            debug!("received query for zone nameserver");
            let record_set = Arc::new(self.build_a_records(master, &[addr]));
            return Ok(LookupRecords::new(lookup_options, record_set));
        }

        let ident = lookup_name
            .strip_suffix(postfix.as_str())
            .unwrap_or(lookup_name);
        let result = self.registry.find_address(ident);

        if result.is_empty() {
            debug!(name = %lookup_name, "A lookup: no records found");
            return Err(LookupError::ResponseCode(ResponseCode::NXDomain));
        }

        debug!(name = %lookup_name, count = result.len(), "A lookup: returning records");
        let dns_name = Name::from(name.clone());
        let record_set = Arc::new(self.build_a_records(dns_name, &result));
        Ok(LookupRecords::new(lookup_options, record_set))
    }
}

#[async_trait]
impl Authority for DiscoAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{rtype:?}");

        trace!(name = %name, rtype = ?rtype, "DNS lookup");

        let result = match rtype {
            RecordType::SOA if name == &self.origin => self
                .build_soa_record()
                .map(|rs| LookupRecords::new(lookup_options, Arc::new(rs))),
            RecordType::NS if name == &self.origin => self
                .build_ns_record()
                .map(|rs| LookupRecords::new(lookup_options, Arc::new(rs))),
            RecordType::A => self.lookup_a(name, lookup_options),
            _ => {
                trace!(name = %name, rtype = ?rtype, "unsupported record type or name");
                Err(LookupError::ResponseCode(ResponseCode::NXDomain))
            }
        };

        match &result {
            Ok(_) => metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed()),
            Err(LookupError::ResponseCode(ResponseCode::NXDomain)) => {
                metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                metrics::record_query_failed(&rtype_str);
            }
            Err(_) => {
                metrics::record_query(&rtype_str, QueryResult::Error, timer.elapsed());
                metrics::record_query_failed(&rtype_str);
            }
        }

        LookupControlFlow::Break(result)
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        // DNSSEC not supported
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
    }

    async fn update(&self, _update: &Request) -> UpdateResult<bool> {
        // Dynamic updates not supported
        Err(ResponseCode::NotImp)
    }
}

/// Authority for the IPv4 reverse zone.
pub struct ReverseAuthority {
    origin: LowerName,
    registry: Arc<Registry>,
}

impl ReverseAuthority {
    /// Create an authority rooted at `in-addr.arpa`.
    pub fn new(registry: Arc<Registry>) -> Result<Self, DiscoError> {
        let origin = Name::from_ascii(format!("{REV_TLD}."))?.into();

        Ok(Self { origin, registry })
    }

    fn lookup_ptr(
        &self,
        name: &LowerName,
        lookup_options: LookupOptions,
    ) -> Result<LookupRecords, LookupError> {
        let name_str = name.to_string();
        let lookup_name = name_str.trim_end_matches('.');
        let postfix = format!(".{REV_TLD}");

        let reversed = lookup_name
            .strip_suffix(postfix.as_str())
            .ok_or(LookupError::ResponseCode(ResponseCode::NXDomain))?;

        let address: IpAddr = self
            .registry
            .reverse(reversed)
            .parse()
            .map_err(|_| LookupError::ResponseCode(ResponseCode::NXDomain))?;

        let ident = self
            .registry
            .find_ident(address)
            .ok_or(LookupError::ResponseCode(ResponseCode::NXDomain))?;

        let target = self
            .registry
            .name(Some(&ident))
            .map_err(|e| LookupError::from(io::Error::other(e.to_string())))?;

        debug!(%address, ident = %ident, "PTR lookup: returning primary ident");

        let dns_name = Name::from(name.clone());
        let mut record_set = RecordSet::new(dns_name.clone(), RecordType::PTR, 0);
        let mut record = Record::from_rdata(
            dns_name,
            self.registry.res_ttl(),
            RData::PTR(PTR(target)),
        );
        record.set_dns_class(hickory_proto::rr::DNSClass::IN);
        record_set.insert(record, 0);

        Ok(LookupRecords::new(lookup_options, Arc::new(record_set)))
    }
}

#[async_trait]
impl Authority for ReverseAuthority {
    type Lookup = LookupRecords;

    fn zone_type(&self) -> ZoneType {
        ZoneType::Primary
    }

    fn is_axfr_allowed(&self) -> bool {
        false
    }

    fn origin(&self) -> &LowerName {
        &self.origin
    }

    async fn lookup(
        &self,
        name: &LowerName,
        rtype: RecordType,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        let timer = Timer::start();
        let rtype_str = format!("{rtype:?}");

        trace!(name = %name, rtype = ?rtype, "reverse DNS lookup");

        let result = match rtype {
            RecordType::PTR => self.lookup_ptr(name, lookup_options),
            _ => Err(LookupError::ResponseCode(ResponseCode::NXDomain)),
        };

        match &result {
            Ok(_) => metrics::record_query(&rtype_str, QueryResult::Success, timer.elapsed()),
            Err(_) => {
                metrics::record_query(&rtype_str, QueryResult::NxDomain, timer.elapsed());
                metrics::record_query_failed(&rtype_str);
            }
        }

        LookupControlFlow::Break(result)
    }

    async fn search(
        &self,
        request_info: RequestInfo<'_>,
        lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        self.lookup(
            request_info.query.name(),
            request_info.query.query_type(),
            lookup_options,
        )
        .await
    }

    async fn get_nsec_records(
        &self,
        _name: &LowerName,
        _lookup_options: LookupOptions,
    ) -> LookupControlFlow<Self::Lookup> {
        LookupControlFlow::Break(Err(LookupError::ResponseCode(ResponseCode::NXDomain)))
    }

    async fn update(&self, _update: &Request) -> UpdateResult<bool> {
        Err(ResponseCode::NotImp)
    }
}
