//! Route table
//!
//! Routes are declared through surface builders only. The native surface
//! (`/api`) can declare public or protected routes; the compatibility
//! surface (`/es`) additionally declares routes that resolve aliases. Each
//! builder fixes the [`Chain`] for the routes it declares, so a native route
//! can never pick up compatibility stages and a protected route can never
//! skip authorization.

use super::chain::{AliasPolicy, Chain, Dialect};
use crate::handler::Action;
use crate::security::Operation;
use crate::{Error, Result};
use axum::http::Method;
use std::collections::HashSet;

pub const NATIVE_PREFIX: &str = "/api";
pub const COMPAT_PREFIX: &str = "/es";

/// What a route ends in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Forward to the operation handler
    Handler(Action),
    /// Served locally from the cluster identity
    EsInfo,
    EsLicense,
    EsXPack,
    Version,
    Healthz,
    /// Relative redirect
    Redirect(&'static str),
}

#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    path: String,
    chain: Chain,
    endpoint: Endpoint,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    pub fn operation(&self) -> Option<Operation> {
        self.chain.operation()
    }
}

/// Builder for routes that live outside any dialect prefix, or under `/api`
pub struct NativeSurface<'a> {
    prefix: &'static str,
    routes: &'a mut Vec<Route>,
}

impl NativeSurface<'_> {
    pub fn public(&mut self, methods: &[Method], path: &str, endpoint: Endpoint) {
        push(self.routes, self.prefix, methods, path, Chain::public(Dialect::Native), endpoint);
    }

    pub fn protected(&mut self, methods: &[Method], path: &str, operation: Operation, action: Action) {
        push(
            self.routes,
            self.prefix,
            methods,
            path,
            Chain::protected(Dialect::Native, operation),
            Endpoint::Handler(action),
        );
    }
}

/// Builder for the `/es` surface
pub struct CompatSurface<'a> {
    routes: &'a mut Vec<Route>,
}

impl CompatSurface<'_> {
    /// Informational route: compatibility stage only
    pub fn public(&mut self, methods: &[Method], path: &str, endpoint: Endpoint) {
        push(self.routes, COMPAT_PREFIX, methods, path, Chain::public(Dialect::Compat), endpoint);
    }

    /// Authorization, then compatibility
    pub fn protected(&mut self, methods: &[Method], path: &str, operation: Operation, action: Action) {
        push(
            self.routes,
            COMPAT_PREFIX,
            methods,
            path,
            Chain::protected(Dialect::Compat, operation),
            Endpoint::Handler(action),
        );
    }

    /// Authorization, compatibility, then alias resolution of `:target`
    pub fn resolving(
        &mut self,
        methods: &[Method],
        path: &str,
        operation: Operation,
        action: Action,
        policy: AliasPolicy,
    ) {
        push(
            self.routes,
            COMPAT_PREFIX,
            methods,
            path,
            Chain::resolving(operation, policy),
            Endpoint::Handler(action),
        );
    }
}

fn push(
    routes: &mut Vec<Route>,
    prefix: &str,
    methods: &[Method],
    path: &str,
    chain: Chain,
    endpoint: Endpoint,
) {
    for method in methods {
        routes.push(Route {
            method: method.clone(),
            path: format!("{}{}", prefix, path),
            chain,
            endpoint,
        });
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    routes: Vec<Route>,
}

impl RouteTableBuilder {
    /// Informational routes at the server root
    pub fn root(mut self, declare: impl FnOnce(&mut NativeSurface<'_>)) -> Self {
        declare(&mut NativeSurface {
            prefix: "",
            routes: &mut self.routes,
        });
        self
    }

    pub fn native(mut self, declare: impl FnOnce(&mut NativeSurface<'_>)) -> Self {
        declare(&mut NativeSurface {
            prefix: NATIVE_PREFIX,
            routes: &mut self.routes,
        });
        self
    }

    pub fn compat(mut self, declare: impl FnOnce(&mut CompatSurface<'_>)) -> Self {
        declare(&mut CompatSurface {
            routes: &mut self.routes,
        });
        self
    }

    /// Freeze the table; a method and path may be declared once
    pub fn build(self) -> Result<RouteTable> {
        let mut seen = HashSet::new();
        for route in &self.routes {
            if !seen.insert((route.method.clone(), route.path.as_str())) {
                return Err(Error::DuplicateRoute {
                    method: route.method.to_string(),
                    path: route.path.clone(),
                });
            }
        }
        Ok(RouteTable {
            routes: self.routes,
        })
    }
}

/// Immutable set of routes, built once at startup
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Look up a declared route by method and path pattern
    pub fn find(&self, method: &Method, path: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.method == *method && route.path == path)
    }

    /// Every route the server exposes
    pub fn standard() -> Result<Self> {
        RouteTable::builder()
            .root(declare_root)
            .native(declare_native)
            .compat(declare_compat)
            .build()
    }
}

fn declare_root(root: &mut NativeSurface<'_>) {
    root.public(&[Method::GET], "/", Endpoint::Redirect("ui/"));
    root.public(&[Method::GET], "/version", Endpoint::Version);
    root.public(&[Method::GET], "/healthz", Endpoint::Healthz);
    root.public(&[Method::GET], "/swagger", Endpoint::Redirect("swagger/index.html"));
    root.public(&[Method::GET], "/swagger/*any", Endpoint::Handler(Action::ApiDocs));
}

fn declare_native(api: &mut NativeSurface<'_>) {
    use Operation as Op;

    // credential exchange
    api.public(&[Method::POST], "/login", Endpoint::Handler(Action::Login));

    api.protected(&[Method::POST, Method::PUT], "/user", Op::AuthCreateUpdateUser, Action::CreateUpdateUser);
    api.protected(&[Method::DELETE], "/user/:id", Op::AuthDeleteUser, Action::DeleteUser);
    api.protected(&[Method::GET], "/user", Op::AuthListUser, Action::ListUser);
    api.protected(&[Method::GET], "/permissions", Op::AuthListPermissions, Action::ListPermissions);
    api.protected(&[Method::GET], "/role", Op::AuthListRole, Action::ListRole);
    api.protected(&[Method::POST, Method::PUT], "/role", Op::AuthCreateUpdateRole, Action::CreateUpdateRole);
    api.protected(&[Method::DELETE], "/role/:id", Op::AuthDeleteRole, Action::DeleteRole);

    api.protected(&[Method::GET], "/index", Op::IndexList, Action::IndexList);
    api.protected(&[Method::GET], "/index_name", Op::IndexNameList, Action::IndexNameList);
    api.protected(&[Method::POST, Method::PUT], "/index", Op::IndexCreate, Action::IndexCreate);
    api.protected(&[Method::PUT], "/index/:target", Op::IndexCreate, Action::IndexCreate);
    api.protected(&[Method::DELETE], "/index/:target", Op::IndexDelete, Action::IndexDelete);
    api.protected(&[Method::GET], "/index/:target", Op::IndexGet, Action::IndexGet);
    api.protected(&[Method::HEAD], "/index/:target", Op::IndexExists, Action::IndexExists);
    api.protected(&[Method::POST], "/index/:target/refresh", Op::IndexRefresh, Action::IndexRefresh);
    api.protected(&[Method::GET], "/:target/_mapping", Op::IndexGetMapping, Action::IndexGetMapping);
    api.protected(&[Method::PUT], "/:target/_mapping", Op::IndexSetMapping, Action::IndexSetMapping);
    api.protected(&[Method::GET], "/:target/_settings", Op::IndexGetSettings, Action::IndexGetSettings);
    api.protected(&[Method::PUT], "/:target/_settings", Op::IndexSetSettings, Action::IndexSetSettings);
    api.protected(&[Method::POST], "/_analyze", Op::IndexAnalyze, Action::IndexAnalyze);
    api.protected(&[Method::POST], "/:target/_analyze", Op::IndexAnalyze, Action::IndexAnalyze);

    api.protected(&[Method::POST], "/:target/_search", Op::SearchV1, Action::SearchV1);

    api.protected(&[Method::POST], "/_bulk", Op::DocumentBulk, Action::Bulk);
    api.protected(&[Method::POST], "/:target/_bulk", Op::DocumentBulk, Action::Bulk);
    api.protected(&[Method::POST], "/:target/_multi", Op::DocumentMulti, Action::Multi);
    api.protected(&[Method::POST], "/_bulkv2", Op::DocumentBulk, Action::BulkV2);
    api.protected(&[Method::POST], "/:target/_bulkv2", Op::DocumentBulk, Action::BulkV2);
    api.protected(&[Method::POST, Method::PUT], "/:target/_doc", Op::DocumentCreate, Action::DocumentCreateUpdate);
    api.protected(&[Method::PUT], "/:target/_doc/:id", Op::DocumentCreate, Action::DocumentCreateUpdate);
    api.protected(&[Method::GET, Method::HEAD], "/:target/_doc/:id", Op::DocumentGet, Action::DocumentGet);
    api.protected(&[Method::POST], "/:target/_update/:id", Op::DocumentUpdate, Action::DocumentUpdate);
    api.protected(&[Method::DELETE], "/:target/_doc/:id", Op::DocumentDelete, Action::DocumentDelete);
}

fn declare_compat(es: &mut CompatSurface<'_>) {
    use AliasPolicy::{Create, Required, Tolerant};
    use Operation as Op;

    es.public(&[Method::GET, Method::HEAD], "/", Endpoint::EsInfo);
    es.public(&[Method::GET], "/_license", Endpoint::EsLicense);
    es.public(&[Method::GET], "/_xpack", Endpoint::EsXPack);

    // search
    es.resolving(&[Method::POST], "/_search", Op::SearchDSL, Action::SearchDSL, Tolerant);
    es.resolving(&[Method::POST], "/_msearch", Op::SearchMultipleSearch, Action::MultipleSearch, Tolerant);
    es.resolving(&[Method::POST], "/:target/_search", Op::SearchDSL, Action::SearchDSL, Tolerant);
    es.resolving(&[Method::POST], "/:target/_msearch", Op::SearchMultipleSearch, Action::MultipleSearch, Tolerant);
    es.resolving(&[Method::POST], "/:target/_delete_by_query", Op::SearchDeleteByQuery, Action::DeleteByQuery, Required);

    // templates and data streams name templates, not indices
    es.protected(&[Method::GET], "/_index_template", Op::IndexListTemplate, Action::IndexListTemplate);
    es.protected(&[Method::POST], "/_index_template", Op::IndexCreateTemplate, Action::IndexCreateTemplate);
    es.protected(&[Method::PUT], "/_index_template/:target", Op::IndexCreateTemplate, Action::IndexCreateTemplate);
    es.protected(&[Method::GET, Method::HEAD], "/_index_template/:target", Op::IndexGetTemplate, Action::IndexGetTemplate);
    es.protected(&[Method::DELETE], "/_index_template/:target", Op::IndexDeleteTemplate, Action::IndexDeleteTemplate);
    es.protected(&[Method::PUT], "/_data_stream/:target", Op::ElasticPutDataStream, Action::PutDataStream);
    es.protected(&[Method::GET, Method::HEAD], "/_data_stream/:target", Op::ElasticGetDataStream, Action::GetDataStream);

    // indices
    es.resolving(&[Method::PUT], "/:target", Op::IndexCreateES, Action::IndexCreateES, Create);
    es.resolving(&[Method::HEAD], "/:target", Op::IndexExists, Action::IndexExists, Required);
    es.resolving(&[Method::GET], "/:target/_mapping", Op::IndexGetESMapping, Action::IndexGetESMapping, Required);
    es.resolving(&[Method::PUT], "/:target/_mapping", Op::IndexSetMapping, Action::IndexSetMapping, Required);
    es.resolving(&[Method::GET], "/:target/_settings", Op::IndexGetSettings, Action::IndexGetSettings, Required);
    es.resolving(&[Method::PUT], "/:target/_settings", Op::IndexSetSettings, Action::IndexSetSettings, Required);
    es.protected(&[Method::POST], "/_analyze", Op::IndexAnalyze, Action::IndexAnalyze);
    es.resolving(&[Method::POST], "/:target/_analyze", Op::IndexAnalyze, Action::IndexAnalyze, Required);
    es.resolving(&[Method::POST], "/:target/_refresh", Op::IndexRefresh, Action::IndexRefresh, Required);

    // aliases
    es.protected(&[Method::POST], "/_aliases", Op::IndexAddOrRemoveESAlias, Action::IndexAddOrRemoveESAlias);
    es.protected(&[Method::GET], "/_alias", Op::IndexGetESAliases, Action::IndexGetESAliases);
    es.resolving(&[Method::GET], "/:target/_alias", Op::IndexGetESAliases, Action::IndexGetESAliases, Tolerant);
    es.protected(&[Method::GET], "/_alias/:target_alias", Op::IndexGetESAliases, Action::IndexGetESAliases);

    // documents
    es.protected(&[Method::POST], "/_bulk", Op::DocumentESBulk, Action::ESBulk);
    es.resolving(&[Method::POST, Method::PUT], "/:target/_bulk", Op::DocumentESBulk, Action::ESBulk, Create);
    es.resolving(&[Method::POST], "/:target/_doc", Op::DocumentCreateUpdate, Action::DocumentCreateUpdate, Create);
    es.resolving(&[Method::PUT, Method::POST], "/:target/_doc/:id", Op::DocumentCreateUpdate, Action::DocumentCreateUpdate, Create);
    es.resolving(&[Method::PUT, Method::POST], "/:target/_create/:id", Op::DocumentCreateUpdate, Action::DocumentCreateUpdate, Create);
    es.resolving(&[Method::POST], "/:target/_update/:id", Op::DocumentUpdate, Action::DocumentUpdate, Required);
    es.resolving(&[Method::DELETE], "/:target/_doc/:id", Op::DocumentDelete, Action::DocumentDelete, Required);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::chain::Stage;

    fn table() -> RouteTable {
        RouteTable::standard().unwrap()
    }

    #[test]
    fn test_standard_table_builds() {
        let table = table();
        assert!(table.routes().len() > 60);
    }

    #[test]
    fn test_duplicate_route_is_rejected() {
        let err = RouteTable::builder()
            .native(|api| {
                api.protected(&[Method::GET], "/index", Operation::IndexList, Action::IndexList);
                api.protected(&[Method::GET], "/index", Operation::IndexGet, Action::IndexGet);
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateRoute { ref path, .. } if path == "/api/index"));
    }

    #[test]
    fn test_only_informational_routes_are_public() {
        let public: Vec<(String, String)> = table()
            .routes()
            .iter()
            .filter(|r| r.chain().is_public())
            .map(|r| (r.method().to_string(), r.path().to_string()))
            .collect();

        for (method, path) in &public {
            assert!(
                !path.starts_with("/api") || path == "/api/login",
                "{} {} is public",
                method,
                path
            );
        }
        assert!(public.contains(&("GET".to_string(), "/es/_license".to_string())));
    }

    #[test]
    fn test_native_routes_never_carry_compat_stages() {
        for route in table().routes() {
            let stages = route.chain().stages();
            let compat_stages = stages
                .iter()
                .filter(|s| !matches!(s, Stage::Authorization(_)))
                .count();
            if route.path().starts_with(NATIVE_PREFIX) {
                assert_eq!(compat_stages, 0, "{} {}", route.method(), route.path());
            }
            if route.path().starts_with(COMPAT_PREFIX) {
                assert!(stages.contains(&Stage::ProtocolCompatibility));
            }
        }
    }

    #[test]
    fn test_authorization_is_always_first() {
        for route in table().routes() {
            let stages = route.chain().stages();
            if let Some(op) = route.operation() {
                assert_eq!(stages[0], Stage::Authorization(op));
            }
        }
    }

    #[test]
    fn test_bulk_paths_share_one_permission() {
        let table = table();
        let v1 = table.find(&Method::POST, "/api/_bulk").unwrap();
        let v2 = table.find(&Method::POST, "/api/_bulkv2").unwrap();
        assert_eq!(v1.operation(), Some(Operation::DocumentBulk));
        assert_eq!(v2.operation(), Some(Operation::DocumentBulk));
        assert_eq!(v1.endpoint(), Endpoint::Handler(Action::Bulk));
        assert_eq!(v2.endpoint(), Endpoint::Handler(Action::BulkV2));
    }

    #[test]
    fn test_alias_policies() {
        let table = table();
        let policy = |method: Method, path: &str| {
            table.find(&method, path).unwrap().chain().alias_policy()
        };
        assert_eq!(policy(Method::POST, "/es/:target/_search"), Some(AliasPolicy::Tolerant));
        assert_eq!(policy(Method::DELETE, "/es/:target/_doc/:id"), Some(AliasPolicy::Required));
        assert_eq!(policy(Method::PUT, "/es/:target"), Some(AliasPolicy::Create));
        assert_eq!(policy(Method::PUT, "/es/_index_template/:target"), None);
    }
}
