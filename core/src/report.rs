use analysis::{AnalysisError, AnalysisRequest, AnalysisResult};

pub fn print_result(result: &AnalysisResult) {
    println!(
        "Position: {} (depth {}, {} line(s), engine {})",
        result.position, result.depth, result.lines, result.engine
    );
    if !result.complete {
        println!("  search stopped at the deadline");
    }

    if result.variations.is_empty() {
        println!("  no variations");
    }
    for pv in &result.variations {
        println!("  {}. {:>6}  {}", pv.rank, pv.score.to_string(), pv.moves.join(" "));
    }

    match &result.best_move {
        Some(best_move) => println!("Best move: {}", best_move),
        None => println!("Best move: none"),
    }
    println!();
}

pub fn print_failure(request: &AnalysisRequest, error: &AnalysisError) {
    eprintln!("Position: {}", request.position);
    eprintln!("  engine failure: {}", error);
    eprintln!();
}
