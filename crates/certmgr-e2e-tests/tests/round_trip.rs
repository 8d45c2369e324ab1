//! Issued certificates decode back to the fields they were requested with.

mod helpers;

use certmgr_pki::{CertUsage, Certificate, Subject};
use certmgr_service::CreateCertificateRequest;
use helpers::*;
use proptest::prelude::*;

fn subject_strategy() -> impl Strategy<Value = Subject> {
    (
        proptest::option::of("[A-Z]{2}"),
        proptest::option::of("[A-Za-z ]{1,16}"),
        proptest::option::of("[A-Za-z0-9 .-]{1,24}"),
        "[a-z0-9.-]{1,32}",
    )
        .prop_map(|(country, org, ou, cn)| Subject {
            country,
            org,
            ou,
            common_name: Some(cn),
            ..Subject::default()
        })
}

fn usage_strategy() -> impl Strategy<Value = CertUsage> {
    prop_oneof![
        Just(CertUsage::Server),
        Just(CertUsage::Client),
        Just(CertUsage::Code),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn issued_certificate_round_trips(
        subject in subject_strategy(),
        usage in usage_strategy(),
        valid_days in 1i64..5000,
        dns in proptest::collection::vec("[a-z]{1,10}\\.test", 0..3),
        octet in 1u8..255,
    ) {
        let h = memory();
        let ns = h.namespace("acme").id;
        let root = h.root(ns, "Acme Root");
        let ip = format!("10.0.0.{octet}");

        let view = h.issue(
            CreateCertificateRequest::new(ns, subject.clone(), usage, valid_days)
                .issued_by(root.id)
                .with_dns_names(dns.clone())
                .with_ip_addresses([ip.clone()]),
        );

        let cert = Certificate::from_pem(&view.cert_pem).unwrap();
        prop_assert_eq!(cert.subject(), &subject);
        prop_assert_eq!(cert.valid_days(), valid_days);
        prop_assert_eq!(cert.dns_names(), dns.as_slice());
        prop_assert_eq!(cert.ip_addresses().len(), 1);
        prop_assert_eq!(cert.ip_addresses()[0].to_string(), ip);
        prop_assert!(cert.key_usage().digital_signature);
        prop_assert!(!cert.is_ca());

        // Re-encoding the parsed DER yields the stored PEM.
        prop_assert_eq!(cert.pem(), view.cert_pem.clone());
        let again = Certificate::from_pem(&cert.pem()).unwrap();
        prop_assert_eq!(again.subject(), cert.subject());
        prop_assert_eq!(again.not_before(), cert.not_before());
        prop_assert_eq!(again.not_after(), cert.not_after());
        prop_assert_eq!(again.key_usage(), cert.key_usage());
        prop_assert_eq!(again.ext_key_usage(), cert.ext_key_usage());
    }
}
