use std::{sync::Arc, time::Duration};

use kube::{ResourceExt, runtime::controller::Action};
use mesh_cni_bgp_crds::v1alpha1::peering_policy::BgpPeeringPolicy;
use tracing::error;

use crate::{Error, Result, context::Context};

const ERROR_REQUEUE_DURATION: Duration = Duration::from_secs(5);

#[tracing::instrument(skip(ctx, policy))]
pub(crate) async fn reconcile(
    policy: Arc<BgpPeeringPolicy>,
    ctx: Arc<Context>,
) -> Result<Action> {
    ctx.reconciler.reconcile_policy(&policy, &ctx.cancel).await?;
    Ok(Action::requeue(ctx.requeue))
}

pub(crate) fn error_policy(
    policy: Arc<BgpPeeringPolicy>,
    error: &Error,
    _ctx: Arc<Context>,
) -> Action {
    for cause in error.causes() {
        error!(%cause, "reconcile error for BgpPeeringPolicy {}", policy.name_any());
    }
    Action::requeue(ERROR_REQUEUE_DURATION)
}
