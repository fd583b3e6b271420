use anyhow::Result;
use katib::{
    api::{
        error::{CreateError, GetError, SubmitError},
        experiment::AlgorithmSpec,
    },
    backend::rest::Server,
    builder::placeholder,
    Client, ExperimentBuilder, ExperimentName, JobTemplate, Namespace, ServerConfig,
};
use tracing_subscriber::EnvFilter;

struct Args {
    url: Option<String>,
    namespace: String,
    name: String,
    create: bool,
    delete: bool,
}

impl Args {
    pub fn from_env() -> Result<Self> {
        let mut args = pico_args::Arguments::from_env();
        Ok(Args {
            url: args.opt_value_from_str(["-u", "--url"])?,
            namespace: args.opt_value_from_str(["-n", "--namespace"])?.unwrap_or_else(|| "team-1".to_string()),
            name: args.opt_value_from_str(["-e", "--name"])?.unwrap_or_else(|| "cmaes-example".to_string()),
            create: args.contains(["-c", "--create"]),
            delete: args.contains(["-d", "--delete"]),
        })
    }
}

fn experiment(args: &Args) -> ExperimentBuilder {
    let job = JobTemplate::new("training-container", "docker.io/kubeflowkatib/pytorch-mnist-cpu:v0.14.0").command(vec![
        "python3".to_string(),
        "/opt/pytorch-mnist/mnist.py".to_string(),
        "--epochs=1".to_string(),
        "--batch-size=64".to_string(),
        format!("--lr={}", placeholder("learningRate")),
        format!("--momentum={}", placeholder("momentum")),
    ]);

    ExperimentBuilder::new(&args.name, &args.namespace)
        .algorithm(AlgorithmSpec::new("cmaes"))
        .minimize("loss", Some(0.001))
        .double_parameter("lr", "0.01", "0.06")
        .double_parameter("momentum", "0.5", "0.9")
        .trial_parameter("learningRate", "Learning rate for the training model", "lr")
        .trial_parameter("momentum", "Momentum for the training model", "momentum")
        .job(job)
        .trial_counts(3, 2, 1)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::from_env()?;
    let config = match &args.url {
        Some(url) => ServerConfig::new(url.as_str()),
        None => ServerConfig::from_env(),
    };
    let mut client = Server::with_config(config);
    let name = ExperimentName::from(args.name.as_str());
    let namespace = Namespace::from(args.namespace.as_str());

    if args.delete {
        match client.delete_experiment(&name, &namespace) {
            Ok(()) => println!("Experiment {} was deleted.", name),
            Err(GetError::DoesNotExist(name)) => println!("The experiment {} does not exist.", name),
            Err(err) => println!("Failed to delete experiment:\n {}", err),
        }
        return Ok(());
    }

    if args.create {
        match experiment(&args).submit(&mut client) {
            Ok(experiment) => println!("Experiment {} was created successfully!", experiment.name()),
            Err(SubmitError::Create(CreateError::AlreadyExists(name))) => {
                println!("The experiment {} already exists.", name);
                println!("Run again without the -c or --create flag to fetch the existing experiment.");
                return Ok(());
            }
            Err(err) => {
                println!("Failed to create experiment:\n {}", err);
                return Ok(());
            }
        }
    }

    match client.get_experiment(&name, &namespace) {
        Ok(experiment) => {
            println!("{}", serde_json::to_string_pretty(&experiment)?);
            for assignment in experiment.optimal_hyperparameters() {
                println!("best {} = {}", assignment.name, assignment.value);
            }
        }
        Err(GetError::DoesNotExist(name)) => {
            println!("The experiment {} does not exist.", name);
            println!("Run again with the -c or --create flag to create a new experiment.");
        }
        Err(err) => println!("Failed to get experiment:\n {}", err),
    }

    Ok(())
}
