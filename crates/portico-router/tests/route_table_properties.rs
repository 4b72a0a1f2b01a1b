//! Whole-table properties of the generated routes.

use portico_core::{RoleGroup, RoleRegistry, ServiceCatalog};
use portico_router::{FilterStage, RouteKind, RouteTable, RouteTableBuilder};
use proptest::prelude::*;

fn roles() -> RoleRegistry {
    RoleRegistry::new(["ROLE_ADMIN"], ["ROLE_SELLER"], ["ROLE_MEMBER"])
}

fn table(names: &[String]) -> RouteTable {
    let catalog = ServiceCatalog::new(names).unwrap();
    RouteTableBuilder::new(&catalog, &roles())
        .gateway_host("http://gw:8000")
        .build()
        .unwrap()
}

/// Distinct base names that never collide with role segments or `v1`/`v3`.
fn service_names() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[a-z]{4,10}", 1..6).prop_map(|set| {
        set.into_iter()
            .filter(|n| !matches!(n.as_str(), "admin" | "seller" | "member"))
            .map(|n| format!("{n}-service"))
            .collect()
    })
}

proptest! {
    #[test]
    fn prop_paths_route_to_their_own_service(names in service_names(), tail in "[a-z0-9]{1,6}") {
        prop_assume!(!names.is_empty());
        let table = table(&names);

        for name in &names {
            let base = name.trim_end_matches("-service");
            let paths = [
                (format!("/{name}/v3/api-docs/{tail}"), RouteKind::Docs),
                (format!("/v1/admin/{base}/{tail}"), RouteKind::RoleScoped),
                (format!("/v1/seller/{base}/{tail}"), RouteKind::RoleScoped),
                (format!("/v1/member/{base}/{tail}"), RouteKind::RoleScoped),
                (format!("/v1/{base}/{tail}"), RouteKind::DefaultProtected),
            ];
            for (path, kind) in paths {
                let m = table.lookup(&path).unwrap();
                prop_assert_eq!(m.rule.service_id(), Some(name.as_str()));
                prop_assert_eq!(m.rule.kind(), kind);
                prop_assert_eq!(m.rule.target(), format!("lb://{name}"));
            }
        }
    }

    #[test]
    fn prop_each_path_matches_exactly_one_rule(names in service_names(), tail in "[a-z0-9/]{0,12}") {
        prop_assume!(!names.is_empty());
        let table = table(&names);
        for name in &names {
            let base = name.trim_end_matches("-service");
            let path = format!("/v1/admin/{base}/{tail}");
            let hits = table.iter().filter(|r| r.pattern().matches(&path).is_some()).count();
            prop_assert_eq!(hits, 1);
        }
    }
}

#[test]
fn admin_route_chain_authenticates_before_authorizing() {
    let table = table(&["orders-service".to_string()]);
    let m = table.lookup("/v1/admin/orders/123").unwrap();

    assert_eq!(m.rule.id(), "orders-admin-routes");
    assert_eq!(m.rule.role_group(), Some(RoleGroup::Admin));

    let stages = m.rule.filters();
    let auth = stages
        .iter()
        .position(|s| matches!(s, FilterStage::Authenticate))
        .unwrap();
    let authz = stages
        .iter()
        .position(|s| matches!(s, FilterStage::Authorize(_)))
        .unwrap();
    assert!(auth < authz);
}

#[test]
fn route_listing_serializes() {
    let table = table(&["orders-service".to_string()]);
    let json = serde_json::to_value(table.get("orders-admin-routes").unwrap()).unwrap();
    assert_eq!(json["id"], "orders-admin-routes");
    assert_eq!(json["pattern"], "/v1/admin/orders/**");
    assert_eq!(json["kind"], "role_scoped");
    assert_eq!(json["role_group"], "admin");
    assert_eq!(json["required_roles"][0], "ROLE_ADMIN");
    assert_eq!(json["filters"][3], "StripPrefix(0)");
}
