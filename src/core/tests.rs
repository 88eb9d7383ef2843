#[cfg(test)]
mod property_tests {
    use crate::core::condition::translate;
    use crate::core::filter::Action;
    use crate::core::orchestrator::apply_batch;
    use crate::core::test_helpers::open_with_namespace;
    use crate::core::memory::MemoryEngine;
    use ipnetwork::Ipv4Network;
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    prop_compose! {
        fn arb_cidr()(addr in any::<u32>(), prefix in 0u8..=32) -> String {
            format!("{}/{}", Ipv4Addr::from(addr), prefix)
        }
    }

    proptest! {
        #[test]
        fn test_mask_has_prefix_leading_ones(addr in any::<u32>(), prefix in 0u8..=32) {
            let cidr = format!("{}/{}", Ipv4Addr::from(addr), prefix);
            let mask = translate(&cidr).unwrap().addr_mask().mask;
            prop_assert_eq!(mask.leading_ones(), u32::from(prefix));
            prop_assert_eq!(mask.trailing_zeros(), 32 - u32::from(prefix));
        }

        #[test]
        fn test_translate_accepts_every_valid_prefix(addr in any::<u32>(), prefix in 0u8..=32) {
            let cidr = format!("{}/{}", Ipv4Addr::from(addr), prefix);
            let am = translate(&cidr).unwrap().addr_mask();
            prop_assert_eq!(am.addr, addr);
            let network = Ipv4Network::new(Ipv4Addr::from(addr), prefix).unwrap();
            prop_assert_eq!(am.mask, u32::from(network.mask()));
            prop_assert_eq!(am.prefix_len(), prefix);
        }

        #[test]
        fn test_translate_rejects_large_prefixes(addr in any::<u32>(), prefix in 33u32..1000) {
            let cidr = format!("{}/{}", Ipv4Addr::from(addr), prefix);
            prop_assert!(translate(&cidr).is_err());
        }

        #[test]
        fn test_translate_rejects_bare_addresses(addr in any::<u32>()) {
            prop_assert!(translate(&Ipv4Addr::from(addr).to_string()).is_err());
        }

        #[test]
        fn test_batch_weights_are_consecutive(
            cidrs in proptest::collection::vec(arb_cidr(), 0..20),
            base in 0u64..1_000_000,
        ) {
            let engine = MemoryEngine::new();
            let (mut session, ns) = open_with_namespace(&engine);

            let ids = apply_batch(&mut session, &ns, Action::Block, base, &cidrs).unwrap();

            let weights: Vec<u64> = engine.filters().iter().map(|f| f.spec.weight).collect();
            let expected: Vec<u64> = (0..cidrs.len() as u64).map(|i| base + i).collect();
            prop_assert_eq!(weights, expected);

            let mut unique = ids.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), cidrs.len());
        }
    }
}
