//! Proxy-failover Git transport
//! Candidate CORS routes, credential callbacks, ls-remote, fetch and push

use crate::error::{Result, SyncError};
use crate::models::RemoteRefs;

/// Built-in CORS proxy candidates, probed in order
pub const DEFAULT_PROXIES: [&str; 2] = [
    "https://gitcors4516.qianchd.workers.dev",
    "https://cors.isomorphic-git.org",
];

/// One way of reaching the remote repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyRoute {
    /// Talk to the remote URL as-is
    Direct,
    /// Prefix-style CORS proxy base URL
    Cors(String),
}

impl ProxyRoute {
    /// Rewrite the repository URL for this route. Proxied form is
    /// `<proxy>/<repo-url-without-scheme>`.
    pub fn rewrite(&self, repo_url: &str) -> Result<String> {
        match self {
            ProxyRoute::Direct => Ok(repo_url.to_string()),
            ProxyRoute::Cors(base) => {
                let parsed = url::Url::parse(repo_url)
                    .map_err(|e| SyncError::Config(format!("Invalid repository URL: {e}")))?;
                let scheme_prefix = format!("{}://", parsed.scheme());
                let stripped = repo_url.strip_prefix(&scheme_prefix).unwrap_or(repo_url);
                Ok(format!("{}/{}", base.trim_end_matches('/'), stripped))
            }
        }
    }
}

impl std::fmt::Display for ProxyRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyRoute::Direct => write!(f, "direct"),
            ProxyRoute::Cors(base) => write!(f, "{base}"),
        }
    }
}

/// Ordered candidate routes. A configured custom proxy replaces the
/// built-in list entirely.
pub fn candidate_routes(custom_proxy: Option<&str>) -> Vec<ProxyRoute> {
    match custom_proxy {
        Some(base) if !base.trim().is_empty() => {
            vec![ProxyRoute::Cors(base.trim().to_string())]
        }
        _ => DEFAULT_PROXIES
            .iter()
            .map(|base| ProxyRoute::Cors(base.to_string()))
            .collect(),
    }
}

/// Credentials handed to libgit2 on demand
#[derive(Debug, Clone)]
pub struct GitAuth {
    pub username: Option<String>,
    pub token: String,
}

impl GitAuth {
    /// Callbacks answering every credential challenge with the token,
    /// as `userpass(username, token)` or token-as-username when no
    /// username is configured.
    pub fn callbacks(&self) -> git2::RemoteCallbacks<'static> {
        let username = self.username.clone();
        let token = self.token.clone();
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, _allowed| match &username {
            Some(user) => git2::Cred::userpass_plaintext(user, &token),
            None => git2::Cred::userpass_plaintext(&token, ""),
        });
        callbacks
    }
}

/// The pinned route and the refs it advertised
#[derive(Debug, Clone)]
pub struct ProxySelection {
    pub route: ProxyRoute,
    pub refs: RemoteRefs,
}

/// ls-remote through one route.
pub fn list_refs(route: &ProxyRoute, repo_url: &str, auth: &GitAuth) -> Result<RemoteRefs> {
    let url = route.rewrite(repo_url)?;
    let mut remote = git2::Remote::create_detached(url.as_str())?;
    let connection = remote.connect_auth(git2::Direction::Fetch, Some(auth.callbacks()), None)?;
    let names: Vec<String> = connection
        .list()?
        .iter()
        .map(|head| head.name().to_string())
        .collect();
    Ok(RemoteRefs::from_ref_names(names))
}

/// Probe candidates in order; the first route that answers an ls-remote
/// is pinned for the rest of the operation.
pub fn select_working_proxy(
    repo_url: &str,
    routes: &[ProxyRoute],
    auth: &GitAuth,
) -> Result<ProxySelection> {
    for route in routes {
        match list_refs(route, repo_url, auth) {
            Ok(refs) => {
                tracing::info!("Pinned route {} for {}", route, repo_url);
                return Ok(ProxySelection {
                    route: route.clone(),
                    refs,
                });
            }
            Err(e) => {
                tracing::warn!("Route {} failed for {}: {}", route, repo_url, e);
            }
        }
    }

    Err(SyncError::AllProxiesFailed(format!(
        "Cannot connect to {repo_url} through any route"
    )))
}

/// Shallow single-branch fetch of `branch` from origin.
pub fn fetch_branch(repo: &git2::Repository, branch: &str, auth: &GitAuth) -> Result<()> {
    let refspec = format!("refs/heads/{branch}:refs/remotes/origin/{branch}");
    let mut remote = repo.find_remote("origin")?;

    let mut shallow_opts = git2::FetchOptions::new();
    shallow_opts.remote_callbacks(auth.callbacks());
    shallow_opts.depth(1);

    if let Err(shallow_err) = remote.fetch(&[refspec.as_str()], Some(&mut shallow_opts), None) {
        // Not every transport can serve shallow packs
        tracing::debug!("Shallow fetch failed ({shallow_err}), retrying full fetch");
        let mut full_opts = git2::FetchOptions::new();
        full_opts.remote_callbacks(auth.callbacks());
        remote.fetch(&[refspec.as_str()], Some(&mut full_opts), None)?;
    }

    Ok(())
}

/// Force-push `branch` to origin.
pub fn push_branch(repo: &git2::Repository, branch: &str, auth: &GitAuth) -> Result<()> {
    let refspec = format!("+refs/heads/{branch}:refs/heads/{branch}");
    let mut remote = repo.find_remote("origin")?;
    let mut push_opts = git2::PushOptions::new();
    push_opts.remote_callbacks(auth.callbacks());
    remote.push(&[refspec.as_str()], Some(&mut push_opts))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestRepo;

    fn auth() -> GitAuth {
        GitAuth {
            username: None,
            token: "tok".to_string(),
        }
    }

    #[test]
    fn test_rewrite_direct_is_identity() {
        let url = "https://github.com/alice/thesis.git";
        assert_eq!(ProxyRoute::Direct.rewrite(url).expect("rewrite"), url);
    }

    #[test]
    fn test_rewrite_cors_strips_scheme() {
        let route = ProxyRoute::Cors("https://cors.isomorphic-git.org/".to_string());
        let rewritten = route
            .rewrite("https://github.com/alice/thesis.git")
            .expect("rewrite");
        assert_eq!(
            rewritten,
            "https://cors.isomorphic-git.org/github.com/alice/thesis.git"
        );
    }

    #[test]
    fn test_candidate_routes_default_order() {
        let routes = candidate_routes(None);
        assert_eq!(
            routes,
            vec![
                ProxyRoute::Cors(DEFAULT_PROXIES[0].to_string()),
                ProxyRoute::Cors(DEFAULT_PROXIES[1].to_string()),
            ]
        );
    }

    #[test]
    fn test_custom_proxy_replaces_defaults() {
        let routes = candidate_routes(Some("https://my.proxy.example"));
        assert_eq!(
            routes,
            vec![ProxyRoute::Cors("https://my.proxy.example".to_string())]
        );
    }

    #[test]
    fn test_blank_custom_proxy_falls_back_to_defaults() {
        assert_eq!(candidate_routes(Some("  ")).len(), 2);
    }

    #[test]
    fn test_list_refs_sees_local_branches() {
        let remote = TestRepo::new();
        remote.create_commit("init", &[("main.tex", "\\documentclass{article}")]);
        remote.create_branch("main");

        let refs = list_refs(&ProxyRoute::Direct, &remote.path_str(), &auth()).expect("refs");
        assert!(refs.has_branch("main"));
    }

    #[test]
    fn test_list_refs_empty_repository() {
        let remote = TestRepo::new_bare();
        let refs = list_refs(&ProxyRoute::Direct, &remote.path_str(), &auth()).expect("refs");
        assert!(refs.is_empty());
    }

    #[test]
    fn test_select_working_proxy_falls_through_to_later_route() {
        let remote = TestRepo::new();
        remote.create_commit("init", &[("main.tex", "x")]);
        remote.create_branch("main");

        // The CORS route cannot rewrite a filesystem path and is skipped
        let routes = vec![
            ProxyRoute::Cors("https://unreachable.example".to_string()),
            ProxyRoute::Direct,
        ];
        let selection =
            select_working_proxy(&remote.path_str(), &routes, &auth()).expect("selection");
        assert_eq!(selection.route, ProxyRoute::Direct);
        assert!(selection.refs.has_branch("main"));
    }

    #[test]
    fn test_select_working_proxy_all_failed() {
        let routes = vec![ProxyRoute::Cors("https://unreachable.example".to_string())];
        let err = select_working_proxy("/no/such/repo", &routes, &auth()).unwrap_err();
        assert!(matches!(err, SyncError::AllProxiesFailed(_)));
    }
}
