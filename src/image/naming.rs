//! Destination naming for mirrored images
//!
//! Mirrors flatten arbitrarily deep source hierarchies into a single
//! namespace, so every source image needs a stable, distinct name there.

/// Path segment under which build hierarchies group their binaries
pub const COMMAND_GROUP_MARKER: &str = "cmd";

/// Maximum number of parent segments folded into a command image name
const MAX_FOLDED_SEGMENTS: usize = 2;

fn normalize(path: &str) -> String {
    path.chars()
        .filter(|c| !matches!(c, '/' | '.' | '-' | '_' | ':'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_domain_like(segment: &str) -> bool {
    segment.contains('.')
}

/// Map `(source repository, destination repository, short name)` to the
/// image name used under the destination repository.
///
/// `source_repo` includes the registry host (`gcr.io/ml-pipeline`),
/// `destination_repo` likewise (`docker.io/gcmirrors`).
pub fn destination_name(source_repo: &str, destination_repo: &str, short_name: &str) -> String {
    let source = source_repo.trim_matches('/');
    let destination = destination_repo.trim_matches('/');

    if same_namespace(source, destination) {
        return short_name.to_string();
    }

    let segments: Vec<&str> = source.split('/').filter(|s| !s.is_empty()).skip(1).collect();

    if segments.last() == Some(&COMMAND_GROUP_MARKER) {
        return fold_command_path(&segments[..segments.len() - 1], short_name);
    }

    let mut parts: Vec<&str> = segments;
    parts.push(short_name);
    parts.join("-")
}

/// A mirror whose destination namespace spells the source path
/// (`k8s.gcr.io` → `docker.io/k8s-gcr-io`) keeps the short names.
fn same_namespace(source: &str, destination: &str) -> bool {
    let source_key = normalize(source);
    if source_key.is_empty() {
        return false;
    }
    if source_key == normalize(destination) {
        return true;
    }
    match destination.split_once('/') {
        Some((_, namespace)) => source_key == normalize(namespace),
        None => false,
    }
}

/// `.../knative.dev/eventing/cmd` + `webhook` → `eventing-webhook`;
/// `.../github.com/tektoncd/triggers/cmd` + `webhook` → `tektoncd-triggers-webhook`.
fn fold_command_path(parents: &[&str], short_name: &str) -> String {
    // The project segment right after the host never takes part.
    let candidates: &[&str] = if parents.len() > 1 { &parents[1..] } else { parents };

    let after_domain = match candidates.iter().rposition(|s| is_domain_like(s)) {
        Some(pos) => &candidates[pos + 1..],
        None => candidates,
    };

    let folded: Vec<String> = if after_domain.is_empty() {
        // `cmd` sits directly under a module root such as `knative.dev`.
        candidates
            .last()
            .map(|s| vec![s.replace('.', "-")])
            .unwrap_or_default()
    } else {
        let start = after_domain.len().saturating_sub(MAX_FOLDED_SEGMENTS);
        after_domain[start..].iter().map(|s| s.to_string()).collect()
    };

    let mut parts = folded;
    parts.push(short_name.to_string());
    parts.join("-")
}
