//! The responder's authoritative view of what it is willing to answer
//! (§4.C): one operation, `records(question) -> ZoneAnswer`, so the
//! responder can be driven in tests by a trivial fixture instead of a real
//! advertised service.
use std::net::IpAddr;

use crate::error::DNSResult;
use crate::name::DomainName;
use crate::records::{RData, ResourceRecord};
use crate::rfc1035::{ClassField, QType};

/// TTL for PTR records, per DNS-SD convention (RFC6763 §4).
pub const PTR_TTL: u32 = 4500;
/// TTL for instance-specific records (SRV/TXT/A/AAAA).
pub const INSTANCE_TTL: u32 = 120;

/// Records a zone returns for one question, split by where they belong in
/// the eventual response: the record(s) that directly answer the question,
/// and records worth including as additionals (SRV's target address, an
/// instance's SRV/TXT alongside its PTR, and so on).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneAnswer {
    pub answers: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl ZoneAnswer {
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty() && self.additionals.is_empty()
    }
}

pub trait Zone {
    fn records(&self, qname: &DomainName, qtype: QType) -> ZoneAnswer;
}

/// One advertised DNS-SD service. Immutable after construction; derives its
/// canonical names from `instance`/`service`/`domain` once and reuses them.
#[derive(Debug, Clone)]
pub struct MDNSService {
    pub instance: String,
    pub service: String,
    pub domain: String,
    pub hostname: DomainName,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
    pub txt: Vec<Vec<u8>>,
}

impl MDNSService {
    pub fn new(
        instance: impl Into<String>,
        service: impl Into<String>,
        hostname: DomainName,
        port: u16,
        addresses: Vec<IpAddr>,
        txt: Vec<Vec<u8>>,
    ) -> Self {
        MDNSService {
            instance: instance.into(),
            service: service.into(),
            domain: "local".to_string(),
            hostname,
            port,
            addresses,
            txt,
        }
    }

    pub fn service_addr(&self) -> DomainName {
        DomainName::try_from(format!("{}.{}", self.service, self.domain).as_str()).unwrap()
    }

    pub fn instance_addr(&self) -> DomainName {
        DomainName::try_from(
            format!("{}.{}.{}", self.instance, self.service, self.domain).as_str(),
        )
        .unwrap()
    }

    pub fn enum_addr(&self) -> DomainName {
        DomainName::try_from(format!("_services._dns-sd._udp.{}", self.domain).as_str()).unwrap()
    }

    fn srv_record(&self) -> ResourceRecord {
        ResourceRecord::new(
            self.instance_addr(),
            ClassField::new(ClassField::IN),
            INSTANCE_TTL,
            RData::Srv {
                priority: 0,
                weight: 0,
                port: self.port,
                target: self.hostname.clone(),
            },
        )
    }

    fn txt_record(&self) -> ResourceRecord {
        ResourceRecord::new(
            self.instance_addr(),
            ClassField::new(ClassField::IN),
            INSTANCE_TTL,
            RData::Txt(self.txt.clone()),
        )
    }

    fn address_records(&self) -> Vec<ResourceRecord> {
        self.addresses
            .iter()
            .map(|addr| match addr {
                IpAddr::V4(v4) => ResourceRecord::new(
                    self.hostname.clone(),
                    ClassField::new(ClassField::IN),
                    INSTANCE_TTL,
                    RData::A(*v4),
                ),
                IpAddr::V6(v6) => ResourceRecord::new(
                    self.hostname.clone(),
                    ClassField::new(ClassField::IN),
                    INSTANCE_TTL,
                    RData::Aaaa(*v6),
                ),
            })
            .collect()
    }

    fn ipv4_records(&self) -> Vec<ResourceRecord> {
        self.addresses
            .iter()
            .filter_map(|addr| match addr {
                IpAddr::V4(v4) => Some(ResourceRecord::new(
                    self.hostname.clone(),
                    ClassField::new(ClassField::IN),
                    INSTANCE_TTL,
                    RData::A(*v4),
                )),
                IpAddr::V6(_) => None,
            })
            .collect()
    }

    fn ipv6_records(&self) -> Vec<ResourceRecord> {
        self.addresses
            .iter()
            .filter_map(|addr| match addr {
                IpAddr::V6(v6) => Some(ResourceRecord::new(
                    self.hostname.clone(),
                    ClassField::new(ClassField::IN),
                    INSTANCE_TTL,
                    RData::Aaaa(*v6),
                )),
                IpAddr::V4(_) => None,
            })
            .collect()
    }
}

impl Zone for MDNSService {
    fn records(&self, qname: &DomainName, qtype: QType) -> ZoneAnswer {
        let enum_addr = self.enum_addr();
        let service_addr = self.service_addr();
        let instance_addr = self.instance_addr();

        let wants = |want: QType| qtype == want || qtype == QType::Any;

        if *qname == enum_addr && wants(QType::Ptr) {
            return ZoneAnswer {
                answers: vec![ResourceRecord::new(
                    enum_addr,
                    ClassField::new(ClassField::IN),
                    PTR_TTL,
                    RData::Ptr(service_addr),
                )],
                additionals: Vec::new(),
            };
        }

        if *qname == service_addr && wants(QType::Ptr) {
            let mut additionals = vec![self.srv_record(), self.txt_record()];
            additionals.extend(self.address_records());

            return ZoneAnswer {
                answers: vec![ResourceRecord::new(
                    service_addr,
                    ClassField::new(ClassField::IN),
                    PTR_TTL,
                    RData::Ptr(instance_addr),
                )],
                additionals,
            };
        }

        if *qname == instance_addr {
            let mut answer = ZoneAnswer::default();

            if wants(QType::Srv) {
                answer.answers.push(self.srv_record());
                answer.additionals.extend(self.address_records());
            }
            if wants(QType::Txt) {
                answer.answers.push(self.txt_record());
            }

            if !answer.is_empty() {
                return answer;
            }
        }

        if *qname == self.hostname {
            if wants(QType::A) {
                let records = self.ipv4_records();
                if !records.is_empty() {
                    return ZoneAnswer {
                        answers: records,
                        additionals: Vec::new(),
                    };
                }
            }
            if wants(QType::Aaaa) {
                let records = self.ipv6_records();
                if !records.is_empty() {
                    return ZoneAnswer {
                        answers: records,
                        additionals: Vec::new(),
                    };
                }
            }
        }

        ZoneAnswer::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn sample_service() -> MDNSService {
        MDNSService::new(
            "Dart Test Server",
            "_puupee._tcp",
            DomainName::try_from("host.local").unwrap(),
            12056,
            vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5))],
            vec![b"path=/api".to_vec()],
        )
    }

    #[test]
    fn service_ptr_query_answers_with_instance_ptr_first() {
        let zone = sample_service();
        let answer = zone.records(&zone.service_addr(), QType::Ptr);

        assert_eq!(answer.answers.len(), 1);
        assert_eq!(
            answer.answers[0].rdata,
            RData::Ptr(zone.instance_addr())
        );
        assert!(answer
            .additionals
            .iter()
            .any(|rr| matches!(rr.rdata, RData::Srv { .. })));
    }

    #[test]
    fn hostname_a_query_returns_one_record_per_address() {
        let zone = sample_service();
        let answer = zone.records(&zone.hostname, QType::A);
        assert_eq!(answer.answers.len(), 1);
    }

    #[test]
    fn unknown_name_returns_empty() {
        let zone = sample_service();
        let bogus = DomainName::try_from("something.else.local").unwrap();
        assert!(zone.records(&bogus, QType::Any).is_empty());
    }

    #[test]
    fn enum_query_returns_service_ptr() {
        let zone = sample_service();
        let answer = zone.records(&zone.enum_addr(), QType::Ptr);
        assert_eq!(answer.answers.len(), 1);
        assert_eq!(answer.answers[0].rdata, RData::Ptr(zone.service_addr()));
    }
}
