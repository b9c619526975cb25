//src/main.rs
mod cli; // Keep cli module for parsing args

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use std::fs::File;
use std::io::{self, stdin, stdout, Write}; // For prompts
use tracing::debug;

use workout_plan_lib::{
    classify, Action, AppService, Config, Day, Exercise, Intent, ProgressReport, Prompt, Render,
    EmptyReason,
};

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // Logs go to stderr so rendered output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

fn main() -> Result<()> {
    let cli_args = cli::parse_args();

    if let cli::Commands::GenerateCompletion { shell } = cli_args.command {
        let mut cmd = cli::build_cli_command();
        let bin_name = cmd.get_name().to_string();
        eprintln!("Generating completion script for {}...", shell);
        clap_complete::generate(shell, &mut cmd, bin_name, &mut stdout());
        return Ok(());
    }

    setup_logging(cli_args.verbose);

    // Initialize the application service (loads config, connects to DB)
    let mut service =
        AppService::initialize().context("Failed to initialize application service")?;
    let user_id = cli_args.user.unwrap_or(service.config.default_user_id);
    let output = Output {
        json: cli_args.json,
        export_csv: cli_args.export_csv,
    };
    debug!(user_id, command = ?cli_args.command, "Running command");

    let intent = match cli_args.command {
        cli::Commands::GenerateCompletion { .. } => {
            unreachable!("Completion generation should have exited already")
        }
        cli::Commands::DbPath => {
            println!("Database file is located at: {:?}", service.get_db_path());
            return Ok(());
        }
        cli::Commands::ConfigPath => {
            println!("Config file is located at: {:?}", service.get_config_path());
            return Ok(());
        }
        cli::Commands::DeleteUser { confirm } => {
            if !confirm
                && !prompt_yes_no(&format!(
                    "Delete user {user_id} and all of their recorded sets? This cannot be undone."
                ))?
            {
                println!("Nothing deleted.");
                return Ok(());
            }
            service
                .delete_user(user_id)
                .with_context(|| format!("Failed to delete user {user_id}"))?;
            println!("User {user_id} and their history were deleted.");
            return Ok(());
        }
        cli::Commands::Cancel { confirm: false } => {
            return run_confirmed(
                &mut service,
                user_id,
                output,
                Intent::ProposeCancel,
                Intent::CancelDay,
                Intent::ResumeWorkout,
            );
        }
        cli::Commands::Reset { confirm: false } => {
            return run_confirmed(
                &mut service,
                user_id,
                output,
                Intent::ProposeReset,
                Intent::ResetAll,
                Intent::AbortReset,
            );
        }
        cli::Commands::Start { username } => Intent::Start { username },
        cli::Commands::Import { file } => {
            let reader =
                File::open(&file).with_context(|| format!("Failed to open {file:?}"))?;
            let table = workout_plan_lib::Table::from_csv_reader(reader)
                .with_context(|| format!("Failed to read plan table from {file:?}"))?;
            Intent::ImportPlan(table)
        }
        cli::Commands::Plan => Intent::GetPlanView,
        cli::Commands::Days => Intent::ChooseDay,
        cli::Commands::Begin { day } => Intent::StartDay(day),
        cli::Commands::Log { weight, reps } => Intent::RecordSet { weight, reps },
        cli::Commands::Say { text } => Intent::FreeText(text),
        cli::Commands::Press { button } => match Intent::from_button(&button) {
            Some(intent) => intent,
            None => bail!("Unknown button identifier '{}'", button),
        },
        cli::Commands::Skip => Intent::SkipSet,
        cli::Commands::Back => Intent::GoBack,
        cli::Commands::Resume => Intent::Resume,
        cli::Commands::Current => Intent::ViewCurrentDay,
        cli::Commands::Cancel { confirm: true } => Intent::CancelDay,
        cli::Commands::Reset { confirm: true } => Intent::ResetAll,
        cli::Commands::Progress => Intent::GetProgressView,
    };

    let renders = dispatch(&mut service, user_id, intent)?;
    output.show(&renders, &service.config)
}

#[derive(Debug, Clone, Copy)]
struct Output {
    json: bool,
    export_csv: bool,
}

impl Output {
    fn show(&self, renders: &[Render], config: &Config) -> Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(renders)?);
        } else {
            for render in renders {
                print_render(render, config, self.export_csv)?;
            }
        }

        if let Some(Render::Error { kind, detail }) =
            renders.iter().find(|r| matches!(r, Render::Error { .. }))
        {
            bail!("{:?}: {}", kind, detail);
        }
        Ok(())
    }
}

fn dispatch(service: &mut AppService, user_id: i64, intent: Intent) -> Result<Vec<Render>> {
    service.dispatch(user_id, intent).map_err(|e| {
        let kind = classify(&e);
        e.context(format!("{kind:?} failure"))
    })
}

/// Proposes a destructive step, asks on stdin, then executes or backs out.
fn run_confirmed(
    service: &mut AppService,
    user_id: i64,
    output: Output,
    propose: Intent,
    execute: Intent,
    decline: Intent,
) -> Result<()> {
    let proposal = dispatch(service, user_id, propose)?;
    output.show(&proposal, &service.config)?;

    let follow = if prompt_yes_no("Proceed?")? {
        execute
    } else {
        decline
    };
    let renders = dispatch(service, user_id, follow)?;
    output.show(&renders, &service.config)
}

fn prompt_yes_no(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    stdout().flush()?;
    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(matches!(input.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn print_actions(actions: &[Action]) {
    if actions.is_empty() {
        return;
    }
    let buttons: Vec<String> = actions
        .iter()
        .map(|a| format!("[{}] {}", a.as_ref(), a.label()))
        .collect();
    println!("  {}", buttons.join("  "));
}

fn print_prompt(prompt: &Prompt, unit: &str) {
    println!("\n{}", prompt.exercise_name);
    println!("  Set {} of {}", prompt.set_position, prompt.total_sets);
    println!("  Target: {} reps", prompt.reps);
    println!("  Rest: {}", prompt.rest);
    if !prompt.recap.is_empty() {
        println!("  Recent progress:");
        for entry in &prompt.recap {
            println!("    {}: {}", entry.date.format("%d/%m/%Y"), entry.summary(unit));
        }
    }
    println!("  Enter the set as '<weight> <reps>' (e.g. 'log 50 10'; '52,5' works too)");
    print_actions(&prompt.actions);
}

fn print_render(render: &Render, config: &Config, export_csv: bool) -> Result<()> {
    let unit = config.units.weight_label();
    match render {
        Render::Menu { actions } => {
            println!("Hi! What would you like to do today?");
            print_actions(actions);
        }
        Render::ImportInstructions { columns } => {
            println!(
                "Send a CSV file with the columns: {}. Use 'import <file>'.",
                columns.join(", ")
            );
        }
        Render::PlanImported {
            days,
            total_exercises,
            actions,
        } => {
            println!("Plan imported successfully.");
            println!("  Training days: {}", days.len());
            println!("  Total exercises: {}", total_exercises);
            println!("  Days: {}", days.join(", "));
            print_actions(actions);
        }
        Render::DaySelection { days, actions } => {
            println!("Choose the training day:");
            for day in days {
                println!(
                    "  [{}] {}",
                    workout_plan_lib::render::day_button(day),
                    day
                );
            }
            print_actions(actions);
        }
        Render::SelectionDismissed => println!("Workout not started."),
        Render::DayStarted { day } => println!("Training day selected: {day}"),
        Render::Prompt(prompt) => print_prompt(prompt, unit),
        Render::SetRecorded {
            exercise,
            set_number,
            total_sets,
            weight,
            reps,
        } => println!(
            "Recorded: {exercise} set {set_number}/{total_sets}: {weight}{unit} × {reps}"
        ),
        Render::SetSkipped {
            exercise,
            set_position,
            total_sets,
        } => println!("Set skipped: {exercise} ({set_position}/{total_sets} done)"),
        Render::SetUndone {
            exercise,
            set_number,
        } => println!("Set undone: {exercise} set {set_number}"),
        Render::SteppedBack {
            exercise,
            set_position,
            total_sets,
        } => println!("Stepped back: {exercise} set {set_position}/{total_sets}"),
        Render::PreviousExercise {
            exercise,
            set_position,
            total_sets,
        } => println!("Back to previous exercise: {exercise} set {set_position}/{total_sets}"),
        Render::DayConcluded => println!("This training day is already finished."),
        Render::DayComplete { day } => println!("Training day {day} completed!"),
        Render::CancelConfirmation { day, actions } => {
            println!("Cancel the workout {day} in progress? Recorded sets are kept.");
            print_actions(actions);
        }
        Render::WorkoutResumed => println!("Workout resumed."),
        Render::DayCancelled { day } => println!("Workout {day} cancelled."),
        Render::ResetConfirmation { actions } => {
            println!("Delete the plan and all recorded progress? This cannot be undone.");
            print_actions(actions);
        }
        Render::ResetAborted => println!("Reset cancelled."),
        Render::ResetDone => println!("Reset complete. Plan and progress deleted."),
        Render::PlanView { days } => print_plan_table(days, config.header_color()),
        Render::DayPlanView {
            day,
            exercises,
            current,
        } => print_day_table(day, exercises, *current, config.header_color()),
        Render::ProgressView { report } => {
            if export_csv {
                print_progress_csv(report)?;
            } else {
                print_progress_table(report, unit, config.header_color());
            }
        }
        Render::Error { kind, detail } => eprintln!("Error ({kind:?}): {detail}"),
    }
    Ok(())
}

fn exercise_header(header_color: Color) -> Vec<Cell> {
    vec![
        Cell::new("#").fg(header_color),
        Cell::new("Exercise").fg(header_color),
        Cell::new("Sets").fg(header_color),
        Cell::new("Reps").fg(header_color),
        Cell::new("Rest").fg(header_color),
    ]
}

fn exercise_row(position: usize, exercise: &Exercise) -> Vec<Cell> {
    vec![
        Cell::new(position.to_string()),
        Cell::new(&exercise.name),
        Cell::new(exercise.sets.to_string()),
        Cell::new(&exercise.reps),
        Cell::new(&exercise.rest),
    ]
}

fn print_plan_table(days: &[Day], header_color: Color) {
    for day in days {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(exercise_header(header_color));
        for (i, exercise) in day.exercises.iter().enumerate() {
            table.add_row(exercise_row(i + 1, exercise));
        }
        println!("{}", day.name);
        println!("{table}");
    }
}

fn print_day_table(day: &str, exercises: &[Exercise], current: usize, header_color: Color) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(exercise_header(header_color));
    for (i, exercise) in exercises.iter().enumerate() {
        let mut row = exercise_row(i + 1, exercise);
        if i == current {
            row = row
                .into_iter()
                .map(|c| c.add_attribute(Attribute::Bold))
                .collect();
        }
        table.add_row(row);
    }
    println!("Training plan - {day}");
    println!("{table}");
    println!("Currently at exercise {}", current + 1);
}

fn print_progress_table(report: &ProgressReport, unit: &str, header_color: Color) {
    let days = match report {
        ProgressReport::Empty {
            reason: EmptyReason::NoPlan,
        } => {
            println!("No plan loaded. Use 'import <file>'.");
            return;
        }
        ProgressReport::Empty {
            reason: EmptyReason::NoLogs,
        } => {
            println!("No training data recorded yet.");
            return;
        }
        ProgressReport::Days { days } => days,
    };

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Day").fg(header_color),
            Cell::new("Exercise").fg(header_color),
            Cell::new("Date").fg(header_color),
            Cell::new("Sets").fg(header_color),
        ]);
    for day in days {
        for exercise in &day.exercises {
            for entry in &exercise.dates {
                table.add_row(vec![
                    Cell::new(&day.day),
                    Cell::new(&exercise.exercise),
                    Cell::new(entry.date.format("%d/%m/%Y").to_string()),
                    Cell::new(entry.summary(unit)),
                ]);
            }
        }
    }
    println!("Your progress");
    println!("{table}");
}

fn print_progress_csv(report: &ProgressReport) -> Result<()> {
    let mut writer = csv::Writer::from_writer(io::stdout());
    writer.write_record(["Day", "Exercise", "Date", "Set", "Weight", "Reps"])?;

    if let ProgressReport::Days { days } = report {
        for day in days {
            for exercise in &day.exercises {
                for entry in &exercise.dates {
                    for (i, set) in entry.sets.iter().enumerate() {
                        writer.write_record([
                            day.day.clone(),
                            exercise.exercise.clone(),
                            entry.date.format("%Y-%m-%d").to_string(),
                            (i + 1).to_string(),
                            set.weight.clone(),
                            set.reps.to_string(),
                        ])?;
                    }
                }
            }
        }
    }

    writer.flush()?;
    Ok(())
}
