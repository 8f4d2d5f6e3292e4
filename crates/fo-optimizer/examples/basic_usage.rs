use fo_optimizer::{
    ForestConfig, ForestOptimizer, Position, SamplingStrategy,
    SearchRun, SearchSpace, TreeRegressorKind,
};
use tracing_subscriber::EnvFilter;

fn objective(position: &Position, space: &SearchSpace) -> f64 {
    let x = space.dimensions[0].values[position.as_slice()[0]].as_f64().unwrap_or(0.0);
    let y = space.dimensions[1].values[position.as_slice()[1]].as_f64().unwrap_or(0.0);
    -(x * x + (y - 1.0).powi(2))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fo_optimizer=info".parse()?))
        .init();

    println!("Forest optimizer basic usage");

    let space = SearchSpace::new()
        .add_float("x", -3.0, 3.0, 61)
        .add_float("y", -2.0, 4.0, 61);
    println!("Search space has {} positions", space.size()?);

    let config = ForestConfig::new()
        .with_tree_regressor(TreeRegressorKind::ExtraTree)
        .with_tree_para("n_estimators", 50)
        .with_xi(0.01)
        .with_sampling(SamplingStrategy::Random, 2_000)
        .with_random_state(42);

    let mut optimizer = ForestOptimizer::new(space.clone(), config)?;
    let status = SearchRun::new(&mut optimizer)
        .execute(30, |p| objective(p, &space))?
        .clone();

    println!("Run {} finished: {:?}", status.id, status.state);
    if let Some(best) = &status.best {
        let values = space.values_at(&best.position)?;
        println!("Best score {:.4} at {:?}", best.score, values);
    }

    // Step-by-step control for callers with their own stopping rule.
    for _ in 0..5 {
        let position = optimizer.propose_next_position()?;
        let score = objective(&position, &space);
        optimizer.record_observation(position.clone(), score)?;
        println!("{} -> {:.4} ({})", position, score, optimizer.phase());
    }

    let rows = optimizer.search_data()?;
    println!("Evaluated {} positions in total", rows.len());
    Ok(())
}
